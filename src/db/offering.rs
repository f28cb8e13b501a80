use async_trait::async_trait;

use tokio_postgres::Row;

use crate::error::*;

use crate::models::*;
use crate::forms::offering::*;
use crate::slug::SlugIndex;

use crate::db::*;
use crate::db::util::*;

#[derive(Clone)]
pub struct OfferingService {
  offering_by_id: VersionedStatement,
  get_offerings: VersionedStatement,
  by_category: VersionedStatement,

  slug_taken: VersionedStatement,
  store_offering: VersionedStatement,
  update_offering: VersionedStatement,
  set_active: VersionedStatement,
}

lazy_static! {
  static ref OFFERING_COLUMNS: ColumnMappers = {
    ColumnMappers {
      table_name: "services",
      columns: vec![
        generated("id"),
        column("title"),
        column("description"),
        column("keywords"),
        column("image_url"),
        column("category_id"),
        column("active"),
        column("slug"),
        generated("created_at"),
        generated("updated_at"),
      ],
    }
  };
}

fn offering_from_row(row: &Row) -> Offering {
  let category_id: i32 = row.get(5);
  Offering {
    id: row.get(0),
    title: row.get(1),
    description: row.get(2),
    keywords: row.get(3),
    image_url: row.get(4),
    category: OfferingCategory::from_id(category_id).unwrap_or_default(),
    active: row.get(6),
    slug: row.get(7),
    created_at: row.get(8),
    updated_at: row.get(9),
  }
}

impl OfferingService {
  pub fn new(cl: SharedClient) -> Result<OfferingService> {
    let select = OFFERING_COLUMNS.build_select_query();
    let offering_by_id = VersionedStatement::new(cl.clone(),
        &format!("{} WHERE id = $1", select))?;
    let get_offerings = VersionedStatement::new(cl.clone(),
        &format!(r#"{} WHERE ($1::boolean IS NULL OR active = $1)
        ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"#, select))?;
    let by_category = VersionedStatement::new(cl.clone(),
        &format!(r#"{} WHERE category_id = $1 AND active
        ORDER BY created_at DESC, id DESC"#, select))?;

    let slug_taken = VersionedStatement::new(cl.clone(),
        r#"SELECT EXISTS(SELECT 1 FROM services
        WHERE slug = $1 AND ($2::integer IS NULL OR id <> $2))"#)?;
    let store_offering = VersionedStatement::new(cl.clone(),
        &OFFERING_COLUMNS.build_insert_returning())?;
    let update_offering = VersionedStatement::new(cl.clone(),
        &format!(r#"UPDATE services SET title = $2, description = $3, keywords = $4,
          image_url = $5, category_id = $6, active = $7, slug = $8, updated_at = NOW()
        WHERE id = $1 RETURNING {}"#, OFFERING_COLUMNS.get_columns()))?;
    let set_active = VersionedStatement::new(cl.clone(),
        &OFFERING_COLUMNS.build_set_flag("id", "active"))?;

    Ok(OfferingService {
      offering_by_id,
      get_offerings,
      by_category,

      slug_taken,
      store_offering,
      update_offering,
      set_active,
    })
  }

  pub async fn prepare(&self) -> Result<()> {
    self.offering_by_id.prepare().await?;
    self.get_offerings.prepare().await?;
    self.by_category.prepare().await?;

    self.slug_taken.prepare().await?;
    self.store_offering.prepare().await?;
    self.update_offering.prepare().await?;
    self.set_active.prepare().await?;
    Ok(())
  }

  pub async fn get_by_id(&self, id: i32) -> Result<Option<Offering>> {
    let row = self.offering_by_id.query_opt(&[&id]).await?;
    Ok(row.as_ref().map(offering_from_row))
  }

  /// Newest first. `active = None` lists every offering.
  pub async fn get_offerings(&self, active: Option<bool>, limit: i64, offset: i64) -> Result<Vec<Offering>> {
    let rows = self.get_offerings.query(&[&active, &limit, &offset]).await?;
    Ok(rows.iter().map(offering_from_row).collect())
  }

  /// Active offerings of one category.
  pub async fn by_category(&self, category: OfferingCategory) -> Result<Vec<Offering>> {
    let rows = self.by_category.query(&[&category.id()]).await?;
    Ok(rows.iter().map(offering_from_row).collect())
  }

  pub async fn store(&self, offering: &NewOffering, slug: &str) -> Result<Offering> {
    let row = self.store_offering.query_one(&[
      &offering.title, &offering.description, &offering.keywords, &offering.image_url,
      &offering.category.id(), &offering.active, &slug,
    ]).await?;
    Ok(offering_from_row(&row))
  }

  pub async fn update(&self, offering: &Offering) -> Result<Option<Offering>> {
    let row = self.update_offering.query_opt(&[
      &offering.id, &offering.title, &offering.description, &offering.keywords,
      &offering.image_url, &offering.category.id(), &offering.active, &offering.slug,
    ]).await?;
    Ok(row.as_ref().map(offering_from_row))
  }

  pub async fn set_active(&self, id: i32, active: bool) -> Result<Option<Offering>> {
    let row = self.set_active.query_opt(&[&id, &active]).await?;
    Ok(row.as_ref().map(offering_from_row))
  }
}

#[async_trait(?Send)]
impl SlugIndex for OfferingService {
  async fn slug_taken(&self, slug: &str, exclude_id: Option<i32>) -> Result<bool> {
    let row = self.slug_taken.query_one(&[&slug, &exclude_id]).await?;
    Ok(row.get(0))
  }
}
