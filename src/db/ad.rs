use chrono::NaiveDate;

use tokio_postgres::Row;

use crate::error::*;

use crate::models::*;
use crate::forms::ad::*;

use crate::db::*;
use crate::db::util::*;

#[derive(Clone)]
pub struct AdService {
  ad_by_id: VersionedStatement,
  get_ads: VersionedStatement,
  running_for_article: VersionedStatement,

  store_ad: VersionedStatement,
  update_ad: VersionedStatement,
  delete_ad: VersionedStatement,
  bump_impressions: VersionedStatement,
  bump_clicks: VersionedStatement,
}

lazy_static! {
  static ref AD_COLUMNS: ColumnMappers = {
    ColumnMappers {
      table_name: "ads",
      columns: vec![
        generated("id"),
        column("article_id"),
        column("kind"),
        column("starts_on"),
        column("ends_on"),
        column("target_url"),
        generated("impressions"),
        generated("clicks"),
        generated("created_at"),
      ],
    }
  };
}

fn ad_from_row(row: &Row) -> Ad {
  Ad {
    id: row.get(0),
    article_id: row.get(1),
    kind: row.get(2),
    starts_on: row.get(3),
    ends_on: row.get(4),
    target_url: row.get(5),
    impressions: row.get(6),
    clicks: row.get(7),
    created_at: row.get(8),
  }
}

impl AdService {
  pub fn new(cl: SharedClient) -> Result<AdService> {
    let select = AD_COLUMNS.build_select_query();
    let ad_by_id = VersionedStatement::new(cl.clone(),
        &format!("{} WHERE id = $1", select))?;
    let get_ads = VersionedStatement::new(cl.clone(),
        &format!(r#"{} WHERE ($1::integer IS NULL OR article_id = $1)
        ORDER BY starts_on DESC, id DESC LIMIT $2 OFFSET $3"#, select))?;
    let running_for_article = VersionedStatement::new(cl.clone(),
        &format!(r#"{} WHERE article_id = $1 AND starts_on <= $2 AND ends_on >= $2
        ORDER BY starts_on DESC, id DESC"#, select))?;

    let store_ad = VersionedStatement::new(cl.clone(),
        &AD_COLUMNS.build_insert_returning())?;
    let update_ad = VersionedStatement::new(cl.clone(),
        &format!(r#"UPDATE ads SET article_id = $2, kind = $3, starts_on = $4,
          ends_on = $5, target_url = $6
        WHERE id = $1 RETURNING {}"#, AD_COLUMNS.get_columns()))?;
    let delete_ad = VersionedStatement::new(cl.clone(),
        "DELETE FROM ads WHERE id = $1")?;
    let bump_impressions = VersionedStatement::new(cl.clone(),
        &AD_COLUMNS.build_increment("id", "impressions"))?;
    let bump_clicks = VersionedStatement::new(cl.clone(),
        &AD_COLUMNS.build_increment("id", "clicks"))?;

    Ok(AdService {
      ad_by_id,
      get_ads,
      running_for_article,

      store_ad,
      update_ad,
      delete_ad,
      bump_impressions,
      bump_clicks,
    })
  }

  pub async fn prepare(&self) -> Result<()> {
    self.ad_by_id.prepare().await?;
    self.get_ads.prepare().await?;
    self.running_for_article.prepare().await?;

    self.store_ad.prepare().await?;
    self.update_ad.prepare().await?;
    self.delete_ad.prepare().await?;
    self.bump_impressions.prepare().await?;
    self.bump_clicks.prepare().await?;
    Ok(())
  }

  pub async fn get_by_id(&self, id: i32) -> Result<Option<Ad>> {
    let row = self.ad_by_id.query_opt(&[&id]).await?;
    Ok(row.as_ref().map(ad_from_row))
  }

  /// Latest campaigns first, optionally for one article.
  pub async fn get_ads(&self, article_id: Option<i32>, limit: i64, offset: i64) -> Result<Vec<Ad>> {
    let rows = self.get_ads.query(&[&article_id, &limit, &offset]).await?;
    Ok(rows.iter().map(ad_from_row).collect())
  }

  pub async fn running_for_article(&self, article_id: i32, today: NaiveDate) -> Result<Vec<Ad>> {
    let rows = self.running_for_article.query(&[&article_id, &today]).await?;
    Ok(rows.iter().map(ad_from_row).collect())
  }

  pub async fn store(&self, ad: &CreateAd) -> Result<Ad> {
    let row = self.store_ad.query_one(&[
      &ad.article_id, &ad.kind.trim(), &ad.starts_on, &ad.ends_on, &ad.target_url,
    ]).await?;
    Ok(ad_from_row(&row))
  }

  pub async fn update(&self, ad: &Ad) -> Result<Option<Ad>> {
    let row = self.update_ad.query_opt(&[
      &ad.id, &ad.article_id, &ad.kind, &ad.starts_on, &ad.ends_on, &ad.target_url,
    ]).await?;
    Ok(row.as_ref().map(ad_from_row))
  }

  /// Returns false when nothing was deleted.
  pub async fn delete(&self, id: i32) -> Result<bool> {
    let count = self.delete_ad.execute(&[&id]).await?;
    Ok(count > 0)
  }

  pub async fn bump_impressions(&self, id: i32) -> Result<Option<Ad>> {
    let row = self.bump_impressions.query_opt(&[&id]).await?;
    Ok(row.as_ref().map(ad_from_row))
  }

  pub async fn bump_clicks(&self, id: i32) -> Result<Option<Ad>> {
    let row = self.bump_clicks.query_opt(&[&id]).await?;
    Ok(row.as_ref().map(ad_from_row))
  }
}
