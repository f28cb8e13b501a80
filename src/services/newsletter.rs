use log::*;

use actix_web::{
  get, post, web, HttpResponse,
  Error
};

use crate::error::*;
use crate::error::Error as AppError;
use crate::app::*;
use crate::auth::AuthData;
use crate::clients::Clients;
use crate::db::DbService;
use crate::forms::*;
use crate::forms::newsletter::*;
use crate::middleware::Auth;
use crate::newsletter::{new_confirmation_token, send_confirmation};

use super::{current_author, fan_out};

/// Subscribe, or resend the confirmation mail to a pending subscriber.
#[post("/newsletter")]
async fn subscribe(
  db: web::Data<DbService>,
  clients: web::Data<Clients>,
  form: web::Json<Subscribe>,
) -> Result<HttpResponse, Error> {
  form.check()?;
  let email = form.email.trim().to_lowercase();
  let name = form.name.as_deref().map(str::trim).filter(|name| !name.is_empty());

  let token = new_confirmation_token();
  let (subscriber, created) = db.newsletter.get_or_create(&email, name, &token).await?;

  if !created {
    if subscriber.confirmed {
      if !subscriber.active {
        db.newsletter.set_active(&email, true).await?;
        info!("Newsletter subscriber {} reactivated", subscriber.id);
      }
      return Ok(HttpResponse::Ok().json(MessageOut::new("this email is already subscribed")));
    }
    if let Err(err) = send_confirmation(&clients.mail, &clients.site_url, &subscriber).await {
      warn!("Failed to resend confirmation to {}: {}", subscriber.email, err);
    }
    return Ok(HttpResponse::Ok().json(MessageOut::new("confirmation email sent again")));
  }

  match send_confirmation(&clients.mail, &clients.site_url, &subscriber).await {
    Ok(()) => {
      info!("Newsletter subscriber {} pending confirmation", subscriber.id);
      Ok(HttpResponse::Created().json(MessageOut::new("subscribed, check your email to confirm")))
    },
    Err(err) => {
      // An unconfirmable row would block the address, drop it.
      error!("Failed to send confirmation to {}: {}", subscriber.email, err);
      db.newsletter.delete(subscriber.id).await?;
      Err(AppError::Upstream("failed to send the confirmation email".to_string()).into())
    },
  }
}

async fn confirm_token(db: &DbService, token: &str) -> Result<HttpResponse> {
  match db.newsletter.confirm(token).await? {
    Some(subscriber) => {
      info!("Newsletter subscriber {} confirmed", subscriber.id);
      Ok(HttpResponse::Ok().json(MessageOut::new("subscription confirmed")))
    },
    None => Err(AppError::not_found("token")),
  }
}

#[get("/newsletter/confirm/{token}")]
async fn confirm_link(
  db: web::Data<DbService>,
  token: web::Path<String>,
) -> Result<HttpResponse, Error> {
  Ok(confirm_token(&db, &token).await?)
}

#[post("/newsletter/confirm/{token}")]
async fn confirm(
  db: web::Data<DbService>,
  token: web::Path<String>,
) -> Result<HttpResponse, Error> {
  Ok(confirm_token(&db, &token).await?)
}

#[post("/newsletter/cancel")]
async fn cancel(
  db: web::Data<DbService>,
  form: web::Json<CancelSubscription>,
) -> Result<HttpResponse, Error> {
  form.check()?;
  let email = form.email.trim().to_lowercase();
  match db.newsletter.set_active(&email, false).await? {
    Some(subscriber) => {
      info!("Newsletter subscriber {} cancelled", subscriber.id);
      Ok(HttpResponse::Ok().json(MessageOut::new("subscription cancelled")))
    },
    None => Err(AppError::not_found("email").into()),
  }
}

#[get("/newsletter", wrap="Auth::required()")]
async fn list(
  db: web::Data<DbService>,
  auth: AuthData,
  page: web::Query<Pagination>,
) -> Result<HttpResponse, Error> {
  current_author(&db, &auth).await?;
  let subscribers = db.newsletter.get_subscribers(page.limit(), page.offset()).await?;
  Ok(HttpResponse::Ok().json(json!({
    "subscribers_count": subscribers.len(),
    "subscribers": subscribers,
  })))
}

/// Mail an article to every active, confirmed subscriber.
#[post("/newsletter/send", wrap="Auth::required()")]
async fn send(
  db: web::Data<DbService>,
  clients: web::Data<Clients>,
  auth: AuthData,
  form: web::Json<SendNewsletter>,
) -> Result<HttpResponse, Error> {
  current_author(&db, &auth).await?;
  let article = db.article.get_by_id(form.article_id).await?
    .ok_or_else(|| AppError::not_found("article"))?;

  let report = fan_out(&db, &clients, &article).await
    .ok_or(AppError::InternalServerError)?;
  Ok(HttpResponse::Ok().json(json!({
    "message": format!("newsletter sent to {} subscribers", report.sent),
    "total": report.total,
    "sent": report.sent,
  })))
}

#[derive(Debug, Clone, Default)]
pub struct NewsletterService;

impl super::Service for NewsletterService {
  fn load_app_config(&mut self, _config: &AppConfig, _prefix: &str) -> Result<()> {
    Ok(())
  }

  fn api_config(&self, web: &mut web::ServiceConfig) {
    web
      .service(subscribe)
      .service(confirm_link)
      .service(confirm)
      .service(cancel)
      .service(list)
      .service(send);
  }
}

pub fn new_factory() -> NewsletterService {
  Default::default()
}
