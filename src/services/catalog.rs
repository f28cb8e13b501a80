use actix_web::{
  get, web, HttpResponse,
  Error
};

use crate::error::*;
use crate::error::Error as AppError;
use crate::app::*;
use crate::db::DbService;
use crate::models::AuthorProfile;

/// Publication states with their stable ids.
#[get("/states")]
async fn states(
  db: web::Data<DbService>,
) -> Result<HttpResponse, Error> {
  Ok(HttpResponse::Ok().json(json!({ "states": db.catalog.get_states().await? })))
}

/// Service categories with their stable ids.
#[get("/categories")]
async fn categories(
  db: web::Data<DbService>,
) -> Result<HttpResponse, Error> {
  Ok(HttpResponse::Ok().json(json!({ "categories": db.catalog.get_categories().await? })))
}

#[get("/authors")]
async fn authors(
  db: web::Data<DbService>,
) -> Result<HttpResponse, Error> {
  let authors: Vec<AuthorProfile> = db.author.get_authors().await?
    .into_iter()
    .map(AuthorProfile::from)
    .collect();
  Ok(HttpResponse::Ok().json(json!({ "authors": authors })))
}

#[get("/authors/{id}")]
async fn author(
  db: web::Data<DbService>,
  id: web::Path<i32>,
) -> Result<HttpResponse, Error> {
  let author = db.author.get_by_id(id.into_inner()).await?
    .ok_or_else(|| AppError::not_found("author"))?;
  Ok(HttpResponse::Ok().json(json!({ "author": AuthorProfile::from(author) })))
}

#[derive(Debug, Clone, Default)]
pub struct CatalogService;

impl super::Service for CatalogService {
  fn load_app_config(&mut self, _config: &AppConfig, _prefix: &str) -> Result<()> {
    Ok(())
  }

  fn api_config(&self, web: &mut web::ServiceConfig) {
    web
      .service(states)
      .service(categories)
      .service(authors)
      .service(author);
  }
}

pub fn new_factory() -> CatalogService {
  Default::default()
}
