use tokio_postgres::Row;

use crate::error::*;

use crate::models::*;

use crate::db::*;
use crate::db::util::*;

#[derive(Clone)]
pub struct AuthorService {
  author_by_id: VersionedStatement,
  author_by_user_id: VersionedStatement,
  get_authors: VersionedStatement,
}

lazy_static! {
  static ref AUTHOR_COLUMNS: ColumnMappers = {
    ColumnMappers {
      table_name: "authors",
      columns: vec![
        generated("id"),
        column("user_id"),
        column("email"),
        column("first_name"),
        column("last_name"),
        column("photo_url"),
        generated("created_at"),
      ],
    }
  };
}

fn author_from_row(row: &Row) -> Author {
  Author {
    id: row.get(0),
    user_id: row.get(1),
    email: row.get(2),
    first_name: row.get(3),
    last_name: row.get(4),
    photo_url: row.get(5),
    created_at: row.get(6),
  }
}

impl AuthorService {
  pub fn new(cl: SharedClient) -> Result<AuthorService> {
    let select = AUTHOR_COLUMNS.build_select_query();
    let author_by_id = VersionedStatement::new(cl.clone(),
        &format!("{} WHERE id = $1", select))?;
    let author_by_user_id = VersionedStatement::new(cl.clone(),
        &format!("{} WHERE user_id = $1", select))?;
    let get_authors = VersionedStatement::new(cl.clone(),
        &format!("{} ORDER BY last_name, first_name", select))?;

    Ok(AuthorService {
      author_by_id,
      author_by_user_id,
      get_authors,
    })
  }

  pub async fn prepare(&self) -> Result<()> {
    self.author_by_id.prepare().await?;
    self.author_by_user_id.prepare().await?;
    self.get_authors.prepare().await?;
    Ok(())
  }

  pub async fn get_by_id(&self, author_id: i32) -> Result<Option<Author>> {
    let row = self.author_by_id.query_opt(&[&author_id]).await?;
    Ok(row.as_ref().map(author_from_row))
  }

  /// The author linked to an authenticated account.
  pub async fn get_by_user_id(&self, user_id: i32) -> Result<Option<Author>> {
    let row = self.author_by_user_id.query_opt(&[&user_id]).await?;
    Ok(row.as_ref().map(author_from_row))
  }

  pub async fn get_authors(&self) -> Result<Vec<Author>> {
    let rows = self.get_authors.query(&[]).await?;
    Ok(rows.iter().map(author_from_row).collect())
  }
}
