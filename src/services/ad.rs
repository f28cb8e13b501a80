use log::*;

use chrono::{NaiveDate, Utc};

use actix_web::{
  get, post, put, delete, web, HttpResponse,
  Error
};

use crate::error::*;
use crate::error::Error as AppError;
use crate::app::*;
use crate::auth::AuthData;
use crate::db::DbService;
use crate::forms::*;
use crate::forms::ad::*;
use crate::middleware::Auth;
use crate::models::*;

use super::current_author;

fn ad_not_found() -> AppError {
  AppError::not_found("ad")
}

fn today() -> NaiveDate {
  Utc::now().naive_utc().date()
}

/// Ads may only point at an existing article.
async fn require_article(db: &DbService, article_id: i32) -> Result<()> {
  match db.article.get_by_id(article_id).await? {
    Some(_) => Ok(()),
    None => Err(AppError::invalid_field("article_id", &format!("unknown article {}", article_id))),
  }
}

#[get("/ads", wrap="Auth::required()")]
async fn list(
  db: web::Data<DbService>,
  auth: AuthData,
  query: web::Query<AdQuery>,
) -> Result<HttpResponse, Error> {
  current_author(&db, &auth).await?;
  let page = query.page();
  let ads = db.ad.get_ads(query.article, page.limit(), page.offset()).await?;
  Ok(HttpResponse::Ok().json(AdList::from(ads)))
}

#[get("/ads/{id}", wrap="Auth::required()")]
async fn get_ad(
  db: web::Data<DbService>,
  auth: AuthData,
  id: web::Path<i32>,
) -> Result<HttpResponse, Error> {
  current_author(&db, &auth).await?;
  let ad = db.ad.get_by_id(id.into_inner()).await?.ok_or_else(ad_not_found)?;
  Ok(HttpResponse::Ok().json(AdOut { ad }))
}

/// Running ads of a published article.
#[get("/articles/{id}/ads")]
async fn article_ads(
  db: web::Data<DbService>,
  id: web::Path<i32>,
) -> Result<HttpResponse, Error> {
  let id = id.into_inner();
  match db.article.get_by_id(id).await? {
    Some(article) if article.state == PublicationState::Published => {
      let ads = db.ad.running_for_article(id, today()).await?;
      Ok(HttpResponse::Ok().json(AdList::from(ads)))
    },
    _ => Err(AppError::not_found("article").into()),
  }
}

#[post("/ads", wrap="Auth::required()")]
async fn store_ad(
  db: web::Data<DbService>,
  auth: AuthData,
  form: web::Json<CreateAd>,
) -> Result<HttpResponse, Error> {
  let form = form.into_inner();
  form.check()?;
  form.check_dates()?;
  current_author(&db, &auth).await?;
  require_article(&db, form.article_id).await?;

  let ad = db.ad.store(&form).await?;
  info!("Ad {} created for article {}", ad.id, ad.article_id);
  Ok(HttpResponse::Created().json(AdOut { ad }))
}

#[put("/ads/{id}", wrap="Auth::required()")]
async fn update_ad(
  db: web::Data<DbService>,
  auth: AuthData,
  id: web::Path<i32>,
  form: web::Json<UpdateAd>,
) -> Result<HttpResponse, Error> {
  let form = form.into_inner();
  form.check()?;
  current_author(&db, &auth).await?;

  let mut ad = db.ad.get_by_id(id.into_inner()).await?.ok_or_else(ad_not_found)?;
  form.apply(&mut ad)?;
  if let Some(article_id) = form.article_id {
    require_article(&db, article_id).await?;
  }
  let ad = db.ad.update(&ad).await?.ok_or_else(ad_not_found)?;
  Ok(HttpResponse::Ok().json(AdOut { ad }))
}

#[delete("/ads/{id}", wrap="Auth::required()")]
async fn delete_ad(
  cfg: web::Data<AdService>,
  db: web::Data<DbService>,
  auth: AuthData,
  id: web::Path<i32>,
) -> Result<HttpResponse, Error> {
  if !cfg.allow_delete {
    return Ok(HttpResponse::Forbidden().json(json!({ "error": "ad deletes are disabled" })));
  }
  current_author(&db, &auth).await?;
  let id = id.into_inner();
  if !db.ad.delete(id).await? {
    return Err(ad_not_found().into());
  }
  info!("Ad {} deleted", id);
  Ok(HttpResponse::Ok().json(MessageOut::new("ad deleted")))
}

#[post("/ads/{id}/impression")]
async fn record_impression(
  db: web::Data<DbService>,
  id: web::Path<i32>,
) -> Result<HttpResponse, Error> {
  let ad = db.ad.bump_impressions(id.into_inner()).await?.ok_or_else(ad_not_found)?;
  trace!("ad {}: impressions={}", ad.id, ad.impressions);
  Ok(HttpResponse::Ok().json(json!({ "impressions": ad.impressions })))
}

#[post("/ads/{id}/click")]
async fn record_click(
  db: web::Data<DbService>,
  id: web::Path<i32>,
) -> Result<HttpResponse, Error> {
  let ad = db.ad.bump_clicks(id.into_inner()).await?.ok_or_else(ad_not_found)?;
  trace!("ad {}: clicks={}", ad.id, ad.clicks);
  Ok(HttpResponse::Ok().json(json!({ "clicks": ad.clicks, "target_url": ad.target_url })))
}

#[derive(Debug, Clone, Default)]
pub struct AdService {
  pub allow_delete: bool,
}

impl super::Service for AdService {
  fn load_app_config(&mut self, config: &AppConfig, _prefix: &str) -> Result<()> {
    self.allow_delete = config.get_bool("ad.allow_delete")?.unwrap_or(true);
    Ok(())
  }

  fn api_config(&self, web: &mut web::ServiceConfig) {
    web
      .app_data(web::Data::new(self.clone()))
      .service(list)
      .service(article_ads)
      .service(get_ad)
      .service(store_ad)
      .service(update_ad)
      .service(delete_ad)
      .service(record_impression)
      .service(record_click);
  }
}

pub fn new_factory() -> AdService {
  Default::default()
}
