use log::*;

use actix_web::{
  get, post, put, delete, web, HttpResponse,
  Error
};

use crate::error::*;
use crate::error::Error as AppError;
use crate::app::*;
use crate::auth::AuthData;
use crate::clients::{resolve_image, Clients};
use crate::db::DbService;
use crate::forms::*;
use crate::forms::offering::*;
use crate::middleware::Auth;
use crate::models::*;
use crate::slug::{update_with_slug, write_with_slug, Sluggable};

use super::{current_author, parse_detail_key};

fn offering_not_found() -> AppError {
  AppError::not_found("service")
}

/// List services. Anonymous callers only see active ones.
#[get("/services", wrap="Auth::optional()")]
async fn list(
  db: web::Data<DbService>,
  auth: Option<AuthData>,
  page: web::Query<Pagination>,
) -> Result<HttpResponse, Error> {
  let active = if auth.is_some() { None } else { Some(true) };
  let offerings = db.offering.get_offerings(active, page.limit(), page.offset()).await?;
  Ok(HttpResponse::Ok().json(OfferingList::from(offerings)))
}

#[get("/services/active")]
async fn list_active(
  db: web::Data<DbService>,
  req: web::Query<LimitQuery>,
) -> Result<HttpResponse, Error> {
  let limit = clamp_limit(req.limit, DEFAULT_PAGE_SIZE);
  let offerings = db.offering.get_offerings(Some(true), limit, 0).await?;
  Ok(HttpResponse::Ok().json(OfferingList::from(offerings)))
}

/// Active services of one category.
#[get("/services/category/{id}")]
async fn by_category(
  db: web::Data<DbService>,
  id: web::Path<i32>,
) -> Result<HttpResponse, Error> {
  let category = OfferingCategory::from_id(id.into_inner())
    .ok_or_else(|| AppError::not_found("category"))?;
  let offerings = db.offering.by_category(category).await?;
  Ok(HttpResponse::Ok().json(OfferingList::from(offerings)))
}

/// get service by `{id}` or `{id}-{slug}`
#[get("/services/{key}", wrap="Auth::optional()")]
async fn get_offering(
  db: web::Data<DbService>,
  auth: Option<AuthData>,
  key: web::Path<String>,
) -> Result<HttpResponse, Error> {
  let id = parse_detail_key(&key).ok_or_else(offering_not_found)?;
  match db.offering.get_by_id(id).await? {
    Some(offering) if offering.active || auth.is_some() => {
      Ok(HttpResponse::Ok().json(OfferingOut { service: offering }))
    },
    _ => Err(offering_not_found().into()),
  }
}

#[post("/services", wrap="Auth::required()")]
async fn store_offering(
  db: web::Data<DbService>,
  clients: web::Data<Clients>,
  auth: AuthData,
  form: web::Json<CreateOffering>,
) -> Result<HttpResponse, Error> {
  let form = form.into_inner();
  form.check()?;
  let category = form.category()?;
  current_author(&db, &auth).await?;

  let image_url = match &form.image {
    Some(image) => {
      resolve_image(&clients.images, "image", image, Some(clients.default_image_url.as_str())).await?
    },
    None => None,
  };
  let new_offering = NewOffering {
    title: form.title.trim().to_string(),
    description: form.description.clone(),
    keywords: form.keywords.clone(),
    image_url,
    category,
    active: form.active.unwrap_or(true),
  };

  let offerings = &db.offering;
  let new_ref = &new_offering;
  let offering = write_with_slug(offerings, &new_offering.title, &Offering::SLUG_POLICY, None,
    move |slug| async move { offerings.store(new_ref, &slug).await }).await?;
  info!("Service {} created as {}", offering.id, offering.absolute_url());
  Ok(HttpResponse::Created().json(OfferingOut { service: offering }))
}

#[put("/services/{id}", wrap="Auth::required()")]
async fn update_offering(
  db: web::Data<DbService>,
  clients: web::Data<Clients>,
  auth: AuthData,
  id: web::Path<i32>,
  form: web::Json<UpdateOffering>,
) -> Result<HttpResponse, Error> {
  let form = form.into_inner();
  form.check()?;
  let category = form.category()?;
  current_author(&db, &auth).await?;

  let id = id.into_inner();
  let mut offering = db.offering.get_by_id(id).await?.ok_or_else(offering_not_found)?;
  let persisted_title = offering.title.clone();

  form.apply(&mut offering, category);
  if let Some(image) = &form.image {
    let fallback = offering.image_url.clone()
      .unwrap_or_else(|| clients.default_image_url.clone());
    offering.image_url = resolve_image(&clients.images, "image", image, Some(fallback.as_str())).await?;
  }
  let new_title = form.title.as_deref().map(str::trim);
  if let Some(title) = new_title {
    offering.title = title.to_string();
  }

  let offerings = &db.offering;
  let changes = &offering;
  let updated = update_with_slug(offerings, &persisted_title, new_title, &Offering::SLUG_POLICY, id,
    move |slug| {
      let mut offering = changes.clone();
      if let Some(slug) = slug {
        offering.slug = slug;
      }
      async move { offerings.update(&offering).await }
    }).await?;

  match updated {
    Some(offering) => Ok(HttpResponse::Ok().json(OfferingOut { service: offering })),
    None => Err(offering_not_found().into()),
  }
}

#[post("/services/{id}/toggle-active", wrap="Auth::required()")]
async fn toggle_active(
  db: web::Data<DbService>,
  auth: AuthData,
  id: web::Path<i32>,
) -> Result<HttpResponse, Error> {
  current_author(&db, &auth).await?;
  let id = id.into_inner();
  let offering = db.offering.get_by_id(id).await?.ok_or_else(offering_not_found)?;
  let offering = db.offering.set_active(id, !offering.active).await?
    .ok_or_else(offering_not_found)?;
  debug!("Service {} active={}", id, offering.active);
  Ok(HttpResponse::Ok().json(OfferingOut { service: offering }))
}

/// Retire a service: it is marked inactive, never deleted.
#[delete("/services/{id}", wrap="Auth::required()")]
async fn delete_offering(
  cfg: web::Data<OfferingService>,
  db: web::Data<DbService>,
  auth: AuthData,
  id: web::Path<i32>,
) -> Result<HttpResponse, Error> {
  if !cfg.allow_delete {
    return Ok(HttpResponse::Forbidden().json(json!({ "error": "service deletes are disabled" })));
  }
  current_author(&db, &auth).await?;
  let id = id.into_inner();
  db.offering.set_active(id, false).await?.ok_or_else(offering_not_found)?;
  info!("Service {} retired", id);
  Ok(HttpResponse::Ok().json(MessageOut::new("service deactivated")))
}

#[derive(Debug, Clone, Default)]
pub struct OfferingService {
  pub allow_delete: bool,
}

impl super::Service for OfferingService {
  fn load_app_config(&mut self, config: &AppConfig, _prefix: &str) -> Result<()> {
    self.allow_delete = config.get_bool("offering.allow_delete")?.unwrap_or(true);
    Ok(())
  }

  fn api_config(&self, web: &mut web::ServiceConfig) {
    web
      .app_data(web::Data::new(self.clone()))
      .service(list)
      .service(list_active)
      .service(by_category)
      .service(get_offering)
      .service(store_offering)
      .service(update_offering)
      .service(toggle_active)
      .service(delete_offering);
  }
}

pub fn new_factory() -> OfferingService {
  Default::default()
}
