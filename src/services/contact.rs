use log::*;

use actix_web::{
  get, post, web, HttpResponse,
  Error
};

use crate::error::*;
use crate::error::Error as AppError;
use crate::app::*;
use crate::auth::AuthData;
use crate::clients::{Clients, Mailer};
use crate::db::DbService;
use crate::forms::CheckForm;
use crate::forms::contact::*;
use crate::middleware::Auth;
use crate::models::ContactMessage;

use super::current_author;

fn message_not_found() -> AppError {
  AppError::not_found("message")
}

fn notification_html(msg: &ContactMessage) -> String {
  use html_escape::encode_safe as text;
  format!(r#"<html><body>
<h2>Nuevo mensaje de contacto</h2>
<p><strong>Nombre:</strong> {}<br>
<strong>Email:</strong> {}<br>
<strong>Asunto:</strong> {}</p>
<p>{}</p>
</body></html>"#, text(&msg.name), text(&msg.email), text(&msg.subject), text(&msg.message))
}

/// Store a message from the public contact form.
#[post("/contact")]
async fn store_message(
  db: web::Data<DbService>,
  clients: web::Data<Clients>,
  form: web::Json<CreateContact>,
) -> Result<HttpResponse, Error> {
  form.check()?;
  let msg = db.contact.store(&form).await?;
  info!("Contact message {} received", msg.id);

  if let Some(notify) = &clients.contact_notify {
    let subject = format!("Nuevo mensaje de contacto: {}", msg.subject);
    if let Err(err) = clients.mail.send(notify, &subject, &notification_html(&msg)).await {
      warn!("Failed to notify {} about contact message {}: {}", notify, msg.id, err);
    }
  }
  Ok(HttpResponse::Created().json(json!({ "contact": msg })))
}

#[get("/contact", wrap="Auth::required()")]
async fn list(
  db: web::Data<DbService>,
  auth: AuthData,
  req: web::Query<ContactQuery>,
) -> Result<HttpResponse, Error> {
  current_author(&db, &auth).await?;
  let messages = db.contact.get_messages(&req).await?;
  Ok(HttpResponse::Ok().json(json!({
    "messages_count": messages.len(),
    "messages": messages,
  })))
}

#[get("/contact/stats", wrap="Auth::required()")]
async fn stats(
  db: web::Data<DbService>,
  auth: AuthData,
) -> Result<HttpResponse, Error> {
  current_author(&db, &auth).await?;
  Ok(HttpResponse::Ok().json(db.contact.stats().await?))
}

#[post("/contact/{id}/mark-read", wrap="Auth::required()")]
async fn mark_read(
  db: web::Data<DbService>,
  auth: AuthData,
  id: web::Path<i32>,
) -> Result<HttpResponse, Error> {
  current_author(&db, &auth).await?;
  let msg = db.contact.mark_read(id.into_inner()).await?.ok_or_else(message_not_found)?;
  Ok(HttpResponse::Ok().json(json!({ "contact": msg })))
}

#[post("/contact/{id}/mark-replied", wrap="Auth::required()")]
async fn mark_replied(
  db: web::Data<DbService>,
  auth: AuthData,
  id: web::Path<i32>,
) -> Result<HttpResponse, Error> {
  current_author(&db, &auth).await?;
  let msg = db.contact.mark_replied(id.into_inner()).await?.ok_or_else(message_not_found)?;
  Ok(HttpResponse::Ok().json(json!({ "contact": msg })))
}

#[derive(Debug, Clone, Default)]
pub struct ContactService;

impl super::Service for ContactService {
  fn load_app_config(&mut self, _config: &AppConfig, _prefix: &str) -> Result<()> {
    Ok(())
  }

  fn api_config(&self, web: &mut web::ServiceConfig) {
    web
      .service(store_message)
      .service(list)
      .service(stats)
      .service(mark_read)
      .service(mark_replied);
  }
}

pub fn new_factory() -> ContactService {
  Default::default()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn notification_lists_the_sender() {
    let msg = ContactMessage {
      id: 1,
      name: "Ana".into(),
      email: "ana@example.com".into(),
      subject: "Consulta".into(),
      message: "Hola".into(),
      sent_at: chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap(),
      read: false,
      replied: false,
    };
    let html = notification_html(&msg);
    assert!(html.contains("ana@example.com"));
    assert!(html.contains("Consulta"));

    let msg = ContactMessage {
      name: r#"Ana "<b>""#.into(),
      message: "<script>x</script>".into(),
      ..msg
    };
    let html = notification_html(&msg);
    assert!(!html.contains("<script>"));
    assert!(!html.contains("<b>"));
    assert!(html.contains("Ana &quot;&lt;b&gt;&quot;"));
  }
}
