use tokio_postgres::Row;

use crate::error::*;

use crate::models::*;
use crate::forms::contact::*;

use crate::db::*;
use crate::db::util::*;

#[derive(Clone)]
pub struct ContactService {
  store_message: VersionedStatement,
  get_messages: VersionedStatement,
  set_read: VersionedStatement,
  set_replied: VersionedStatement,
  get_stats: VersionedStatement,
}

lazy_static! {
  static ref CONTACT_COLUMNS: ColumnMappers = {
    ColumnMappers {
      table_name: "contact_messages",
      columns: vec![
        generated("id"),
        column("name"),
        column("email"),
        column("subject"),
        column("message"),
        generated("sent_at"),
        generated("read"),
        generated("replied"),
      ],
    }
  };
}

fn message_from_row(row: &Row) -> ContactMessage {
  ContactMessage {
    id: row.get(0),
    name: row.get(1),
    email: row.get(2),
    subject: row.get(3),
    message: row.get(4),
    sent_at: row.get(5),
    read: row.get(6),
    replied: row.get(7),
  }
}

impl ContactService {
  pub fn new(cl: SharedClient) -> Result<ContactService> {
    let store_message = VersionedStatement::new(cl.clone(),
        &CONTACT_COLUMNS.build_insert_returning())?;
    let get_messages = VersionedStatement::new(cl.clone(),
        &format!(r#"{}
        WHERE ($1::boolean IS NULL OR read = $1)
          AND ($2::boolean IS NULL OR replied = $2)
        ORDER BY sent_at DESC, id DESC LIMIT $3 OFFSET $4"#, CONTACT_COLUMNS.build_select_query()))?;
    let set_read = VersionedStatement::new(cl.clone(),
        &CONTACT_COLUMNS.build_set_flag("id", "read"))?;
    let set_replied = VersionedStatement::new(cl.clone(),
        &CONTACT_COLUMNS.build_set_flag("id", "replied"))?;
    let get_stats = VersionedStatement::new(cl.clone(),
        r#"SELECT COUNT(*),
          COUNT(*) FILTER (WHERE NOT read),
          COUNT(*) FILTER (WHERE NOT replied)
        FROM contact_messages"#)?;

    Ok(ContactService {
      store_message,
      get_messages,
      set_read,
      set_replied,
      get_stats,
    })
  }

  pub async fn prepare(&self) -> Result<()> {
    self.store_message.prepare().await?;
    self.get_messages.prepare().await?;
    self.set_read.prepare().await?;
    self.set_replied.prepare().await?;
    self.get_stats.prepare().await?;
    Ok(())
  }

  pub async fn store(&self, msg: &CreateContact) -> Result<ContactMessage> {
    let row = self.store_message.query_one(&[
      &msg.name.trim(), &msg.email.trim(), &msg.subject.trim(), &msg.message,
    ]).await?;
    Ok(message_from_row(&row))
  }

  pub async fn get_messages(&self, req: &ContactQuery) -> Result<Vec<ContactMessage>> {
    let page = req.page();
    let rows = self.get_messages.query(&[
      &req.read, &req.replied, &page.limit(), &page.offset(),
    ]).await?;
    Ok(rows.iter().map(message_from_row).collect())
  }

  pub async fn mark_read(&self, id: i32) -> Result<Option<ContactMessage>> {
    let row = self.set_read.query_opt(&[&id, &true]).await?;
    Ok(row.as_ref().map(message_from_row))
  }

  pub async fn mark_replied(&self, id: i32) -> Result<Option<ContactMessage>> {
    let row = self.set_replied.query_opt(&[&id, &true]).await?;
    Ok(row.as_ref().map(message_from_row))
  }

  pub async fn stats(&self) -> Result<ContactStats> {
    let row = self.get_stats.query_one(&[]).await?;
    Ok(ContactStats {
      total: row.get(0),
      unread: row.get(1),
      unreplied: row.get(2),
    })
  }
}
