use log::*;

use actix_web::{
  post, web, HttpResponse,
  Error
};

use crate::error::*;
use crate::app::*;
use crate::auth::AuthData;
use crate::clients::{decode_image, Clients, ImageHost};
use crate::db::DbService;
use crate::forms::CheckForm;
use crate::forms::upload::*;
use crate::middleware::Auth;

use super::current_author;

/// Upload an image to the image host and return its URL.
#[post("/upload", wrap="Auth::required()")]
async fn upload(
  db: web::Data<DbService>,
  clients: web::Data<Clients>,
  auth: AuthData,
  form: web::Json<UploadImage>,
) -> Result<HttpResponse, Error> {
  form.check()?;
  let author = current_author(&db, &auth).await?;
  let bytes = decode_image("image", &form.image)?;
  // Nothing to fall back to here, the caller needs the URL.
  let url = clients.images.upload(&bytes).await?;
  info!("Author {} uploaded {} bytes", author.id, bytes.len());
  Ok(HttpResponse::Ok().json(UploadOut { url }))
}

#[derive(Debug, Clone, Default)]
pub struct UploadService;

impl super::Service for UploadService {
  fn load_app_config(&mut self, _config: &AppConfig, _prefix: &str) -> Result<()> {
    Ok(())
  }

  fn api_config(&self, web: &mut web::ServiceConfig) {
    web.service(upload);
  }
}

pub fn new_factory() -> UploadService {
  Default::default()
}
