//! Newsletter emails: subscription confirmation and the fan-out sent when an
//! article is published.

use log::*;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use html_escape::{encode_double_quoted_attribute as attr, encode_safe as text};
use rand::RngCore;
use serde::Serialize;

use crate::clients::Mailer;
use crate::error::*;
use crate::models::{Article, Subscriber};
use crate::slug::Sluggable;

/// Outcome of one fan-out batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NewsletterReport {
  pub total: usize,
  pub sent: usize,
}

impl NewsletterReport {
  pub fn failed(&self) -> usize {
    self.total - self.sent
  }
}

/// Random URL-safe token mailed to new subscribers.
pub fn new_confirmation_token() -> String {
  let mut bytes = [0u8; 32];
  rand::thread_rng().fill_bytes(&mut bytes);
  URL_SAFE_NO_PAD.encode(bytes)
}

fn unsubscribe_footer(site_url: &str) -> String {
  format!(r#"<hr>
<p>Recibiste este email porque estás suscrito a nuestro newsletter.<br>
<a href="{}/newsletter/cancelar">Cancelar suscripción</a></p>"#, site_url)
}

pub fn confirmation_html(site_url: &str, subscriber: &Subscriber) -> String {
  let greeting = match subscriber.name.as_deref() {
    Some(name) if !name.is_empty() => format!("¡Hola {}!", text(name)),
    _ => "¡Hola!".to_string(),
  };
  format!(r#"<html><body>
<h1>{}</h1>
<p>Gracias por suscribirte a nuestro newsletter. Para confirmar tu suscripción, haz clic en el siguiente enlace:</p>
<p><a href="{}/newsletter/confirmar/{}">Confirmar Suscripción</a></p>
<p>Si no te suscribiste, puedes ignorar este correo.</p>
</body></html>"#, greeting, site_url, subscriber.confirmation_token)
}

pub fn article_html(site_url: &str, article: &Article) -> String {
  let image = article.lead_image()
    .map(|url| format!(r#"<img src="{}" alt="{}">"#, attr(url), attr(&article.title)))
    .unwrap_or_default();
  format!(r#"<html><body>
{}
<h1>{}</h1>
<p>{}</p>
<p><a href="{}{}">Leer Noticia Completa</a></p>
{}
</body></html>"#,
    image, text(&article.title), text(&article.subtitle),
    site_url, article.absolute_url().trim_end_matches('/'),
    unsubscribe_footer(site_url))
}

/// Mail the confirmation link to a pending subscriber.
pub async fn send_confirmation<M>(mailer: &M, site_url: &str, subscriber: &Subscriber) -> Result<()>
where
  M: Mailer + ?Sized,
{
  mailer.send(&subscriber.email, "Confirma tu suscripción al Newsletter",
    &confirmation_html(site_url, subscriber)).await
}

/// Send `article` to every subscriber that receives newsletters.
/// Per-recipient failures are logged and counted, the batch always completes.
pub async fn notify_published<M>(
  mailer: &M,
  site_url: &str,
  article: &Article,
  subscribers: &[Subscriber],
) -> NewsletterReport
where
  M: Mailer + ?Sized,
{
  let subject = format!("Nueva publicación: {}", article.title);
  let html = article_html(site_url, article);

  let mut report = NewsletterReport::default();
  for subscriber in subscribers.iter().filter(|s| s.receives_newsletter()) {
    report.total += 1;
    match mailer.send(&subscriber.email, &subject, &html).await {
      Ok(()) => report.sent += 1,
      Err(err) => warn!("Newsletter to {} failed: {}", subscriber.email, err),
    }
  }
  info!("Newsletter for article {}: sent {} of {}", article.id, report.sent, report.total);
  report
}

#[cfg(test)]
mod tests {
  use super::*;

  use chrono::NaiveDate;

  use crate::clients::memory::MemoryMailer;
  use crate::models::{AuthorProfile, PublicationState};
  use crate::visits::VisitCounters;

  fn subscriber(id: i32, email: &str, active: bool, confirmed: bool) -> Subscriber {
    Subscriber {
      id,
      email: email.to_string(),
      name: None,
      subscribed_at: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap(),
      active,
      confirmation_token: format!("token-{}", id),
      confirmed,
    }
  }

  fn article() -> Article {
    let now = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
    Article {
      id: 12,
      author: AuthorProfile {
        id: 1,
        first_name: "Ana".to_string(),
        last_name: "Pérez".to_string(),
        photo_url: String::new(),
      },
      editor_ids: vec![],
      title: "Gran Final".to_string(),
      subtitle: "Todo lo que pasó".to_string(),
      body: "...".to_string(),
      keywords: String::new(),
      slug: "gran-final".to_string(),
      published_on: now.date(),
      state: PublicationState::Published,
      subscribers_only: false,
      show_credits: true,
      images: vec!["https://i.ibb.co/a.png".to_string()],
      visits: VisitCounters::new(now),
      created_at: now,
      updated_at: now,
    }
  }

  #[actix_rt::test]
  async fn fan_out_skips_inactive_and_unconfirmed() {
    let mailer = MemoryMailer::new();
    let subscribers = vec![
      subscriber(1, "a@example.com", true, true),
      subscriber(2, "b@example.com", false, true),
      subscriber(3, "c@example.com", true, false),
      subscriber(4, "d@example.com", true, true),
    ];
    let report = notify_published(&mailer, "https://diario.example.com", &article(), &subscribers).await;
    assert_eq!(report, NewsletterReport { total: 2, sent: 2 });

    let sent = mailer.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].subject, "Nueva publicación: Gran Final");
    assert!(sent[0].html.contains("https://diario.example.com/noticias/12-gran-final\""));
    assert!(sent[0].html.contains("https://i.ibb.co/a.png"));
  }

  #[actix_rt::test]
  async fn failed_recipients_do_not_abort_the_batch() {
    let mailer = MemoryMailer::rejecting(&["a@example.com"]);
    let subscribers = vec![
      subscriber(1, "a@example.com", true, true),
      subscriber(2, "b@example.com", true, true),
    ];
    let report = notify_published(&mailer, "http://localhost", &article(), &subscribers).await;
    assert_eq!(report.total, 2);
    assert_eq!(report.sent, 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(mailer.sent()[0].to, "b@example.com");
  }

  #[actix_rt::test]
  async fn confirmation_carries_the_token() {
    let mailer = MemoryMailer::new();
    let mut sub = subscriber(5, "e@example.com", true, false);
    sub.name = Some("Eva".to_string());
    send_confirmation(&mailer, "http://localhost:5173", &sub).await.unwrap();
    let sent = mailer.sent();
    assert!(sent[0].html.contains("http://localhost:5173/newsletter/confirmar/token-5"));
    assert!(sent[0].html.contains("¡Hola Eva!"));
  }

  #[test]
  fn subscriber_text_is_escaped() {
    let mut sub = subscriber(6, "f@example.com", true, false);
    sub.name = Some(r#"<a href="https://evil">Click</a>"#.to_string());
    let html = confirmation_html("https://diario.example.com", &sub);
    assert!(!html.contains("<a href=\"https://evil\">"));
    assert!(html.contains("¡Hola &lt;a href=&quot;https:"));
    assert!(html.contains("&gt;Click&lt;"));
  }

  #[test]
  fn article_text_is_escaped() {
    let mut art = article();
    art.title = "Tom & Jerry <b>".to_string();
    art.images = vec![r#"https://i.ibb.co/a.png" onerror="x"#.to_string()];
    let html = article_html("https://diario.example.com", &art);
    assert!(html.contains("<h1>Tom &amp; Jerry &lt;b&gt;</h1>"));
    assert!(!html.contains(r#"" onerror=""#));
  }

  #[test]
  fn tokens_are_url_safe_and_distinct() {
    let a = new_confirmation_token();
    let b = new_confirmation_token();
    assert_ne!(a, b);
    assert_eq!(a.len(), 43);
    assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
  }
}
