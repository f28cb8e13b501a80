use crate::error::*;

use crate::models::*;

use crate::db::*;

/// Fixed lookup tables, read back from the database so the seeded rows are
/// what clients see.
#[derive(Clone)]
pub struct CatalogService {
  get_states: VersionedStatement,
  get_categories: VersionedStatement,
}

fn entries<T, F>(rows: &[tokio_postgres::Row], lookup: F) -> Vec<CatalogEntry>
where
  T: Into<CatalogEntry>,
  F: Fn(i32) -> Option<T>,
{
  rows.iter()
    .filter_map(|row| lookup(row.get(0)))
    .map(Into::into)
    .collect()
}

impl CatalogService {
  pub fn new(cl: SharedClient) -> Result<CatalogService> {
    let get_states = VersionedStatement::new(cl.clone(),
        r#"SELECT id FROM publication_states ORDER BY id"#)?;
    let get_categories = VersionedStatement::new(cl.clone(),
        r#"SELECT id FROM service_categories ORDER BY id"#)?;

    Ok(CatalogService {
      get_states,
      get_categories,
    })
  }

  pub async fn prepare(&self) -> Result<()> {
    self.get_states.prepare().await?;
    self.get_categories.prepare().await?;
    Ok(())
  }

  pub async fn get_states(&self) -> Result<Vec<CatalogEntry>> {
    let rows = self.get_states.query(&[]).await?;
    Ok(entries(&rows, PublicationState::from_id))
  }

  pub async fn get_categories(&self) -> Result<Vec<CatalogEntry>> {
    let rows = self.get_categories.query(&[]).await?;
    Ok(entries(&rows, OfferingCategory::from_id))
  }
}
