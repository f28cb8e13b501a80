use tokio_postgres::Row;

use crate::error::*;

use crate::models::*;

use crate::db::*;
use crate::db::util::*;

#[derive(Clone)]
pub struct NewsletterService {
  by_email: VersionedStatement,
  insert_subscriber: VersionedStatement,
  confirm: VersionedStatement,
  set_active: VersionedStatement,
  delete_subscriber: VersionedStatement,
  get_subscribers: VersionedStatement,
  get_recipients: VersionedStatement,
}

lazy_static! {
  static ref SUBSCRIBER_COLUMNS: ColumnMappers = {
    ColumnMappers {
      table_name: "newsletter_subscribers",
      columns: vec![
        generated("id"),
        column("email"),
        column("name"),
        generated("subscribed_at"),
        generated("active"),
        column("confirmation_token"),
        generated("confirmed"),
      ],
    }
  };
}

fn subscriber_from_row(row: &Row) -> Subscriber {
  Subscriber {
    id: row.get(0),
    email: row.get(1),
    name: row.get(2),
    subscribed_at: row.get(3),
    active: row.get(4),
    confirmation_token: row.get(5),
    confirmed: row.get(6),
  }
}

impl NewsletterService {
  pub fn new(cl: SharedClient) -> Result<NewsletterService> {
    let select = SUBSCRIBER_COLUMNS.build_select_query();
    let columns = SUBSCRIBER_COLUMNS.get_columns();

    let by_email = VersionedStatement::new(cl.clone(),
        &format!("{} WHERE email = $1", select))?;
    let insert_subscriber = VersionedStatement::new(cl.clone(),
        &format!(r#"INSERT INTO newsletter_subscribers(email, name, confirmation_token)
        VALUES($1, $2, $3) ON CONFLICT (email) DO NOTHING RETURNING {}"#, columns))?;
    let confirm = VersionedStatement::new(cl.clone(),
        &format!(r#"UPDATE newsletter_subscribers SET confirmed = TRUE, active = TRUE
        WHERE confirmation_token = $1 RETURNING {}"#, columns))?;
    let set_active = VersionedStatement::new(cl.clone(),
        &SUBSCRIBER_COLUMNS.build_set_flag("email", "active"))?;
    let delete_subscriber = VersionedStatement::new(cl.clone(),
        r#"DELETE FROM newsletter_subscribers WHERE id = $1"#)?;
    let get_subscribers = VersionedStatement::new(cl.clone(),
        &format!("{} ORDER BY subscribed_at DESC, id DESC LIMIT $1 OFFSET $2", select))?;
    let get_recipients = VersionedStatement::new(cl.clone(),
        &format!("{} WHERE active AND confirmed ORDER BY id", select))?;

    Ok(NewsletterService {
      by_email,
      insert_subscriber,
      confirm,
      set_active,
      delete_subscriber,
      get_subscribers,
      get_recipients,
    })
  }

  pub async fn prepare(&self) -> Result<()> {
    self.by_email.prepare().await?;
    self.insert_subscriber.prepare().await?;
    self.confirm.prepare().await?;
    self.set_active.prepare().await?;
    self.delete_subscriber.prepare().await?;
    self.get_subscribers.prepare().await?;
    self.get_recipients.prepare().await?;
    Ok(())
  }

  pub async fn get_by_email(&self, email: &str) -> Result<Option<Subscriber>> {
    let row = self.by_email.query_opt(&[&email]).await?;
    Ok(row.as_ref().map(subscriber_from_row))
  }

  /// Insert a pending subscriber, or return the existing one.
  /// The flag is true when the row was created.
  pub async fn get_or_create(&self, email: &str, name: Option<&str>, token: &str) -> Result<(Subscriber, bool)> {
    if let Some(row) = self.insert_subscriber.query_opt(&[&email, &name, &token]).await? {
      return Ok((subscriber_from_row(&row), true));
    }
    match self.get_by_email(email).await? {
      Some(subscriber) => Ok((subscriber, false)),
      // Deleted between the two statements.
      None => Err(Error::Conflict("newsletter_subscribers_email_key".to_string())),
    }
  }

  pub async fn confirm(&self, token: &str) -> Result<Option<Subscriber>> {
    let row = self.confirm.query_opt(&[&token]).await?;
    Ok(row.as_ref().map(subscriber_from_row))
  }

  pub async fn set_active(&self, email: &str, active: bool) -> Result<Option<Subscriber>> {
    let row = self.set_active.query_opt(&[&email, &active]).await?;
    Ok(row.as_ref().map(subscriber_from_row))
  }

  pub async fn delete(&self, id: i32) -> Result<u64> {
    Ok(self.delete_subscriber.execute(&[&id]).await?)
  }

  pub async fn get_subscribers(&self, limit: i64, offset: i64) -> Result<Vec<Subscriber>> {
    let rows = self.get_subscribers.query(&[&limit, &offset]).await?;
    Ok(rows.iter().map(subscriber_from_row).collect())
  }

  /// Active, confirmed subscribers.
  pub async fn get_recipients(&self) -> Result<Vec<Subscriber>> {
    let rows = self.get_recipients.query(&[]).await?;
    Ok(rows.iter().map(subscriber_from_row).collect())
  }
}
