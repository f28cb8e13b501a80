use log::*;

use async_trait::async_trait;

use crate::app::Table;
use crate::error::*;

use super::Mailer;

pub const DEFAULT_SEND_URL: &str = "https://api.mailjet.com/v3.1/send";
pub const DEFAULT_FROM_NAME: &str = "Agencia Atenas";

/// Mailjet transactional email client (send API v3.1).
#[derive(Clone)]
pub struct Mailjet {
  http: reqwest::Client,
  api_key: String,
  secret_key: String,
  send_url: String,
  from_email: String,
  from_name: String,
}

impl Mailjet {
  pub fn from_config(table: &Table) -> Result<Self> {
    let api_key = table.get_str("api_key")?.unwrap_or_default();
    if api_key.is_empty() {
      warn!("mail.api_key not set, emails will fail");
    }
    Ok(Self {
      http: reqwest::Client::new(),
      api_key,
      secret_key: table.get_str("secret_key")?.unwrap_or_default(),
      send_url: table.get_str("send_url")?.unwrap_or_else(|| DEFAULT_SEND_URL.to_string()),
      from_email: table.get_str("from_email")?.unwrap_or_default(),
      from_name: table.get_str("from_name")?.unwrap_or_else(|| DEFAULT_FROM_NAME.to_string()),
    })
  }

  fn message(&self, to: &str, subject: &str, html: &str) -> serde_json::Value {
    json!({
      "Messages": [{
        "From": { "Email": self.from_email, "Name": self.from_name },
        "To": [{ "Email": to }],
        "Subject": subject,
        "HTMLPart": html,
        "TextPart": strip_tags(html),
      }],
    })
  }
}

#[async_trait(?Send)]
impl Mailer for Mailjet {
  async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
    let resp = self.http.post(&self.send_url)
      .basic_auth(&self.api_key, Some(&self.secret_key))
      .json(&self.message(to, subject, html))
      .send()
      .await?;
    let status = resp.status();
    if status.is_success() {
      debug!("Mail '{}' sent to {}", subject, to);
      Ok(())
    } else {
      let body = resp.text().await.unwrap_or_default();
      debug!("mailjet send failed: status={}, body={}", status, body);
      Err(Error::Upstream(format!("mailjet: HTTP {}", status)))
    }
  }
}

/// Plain text part for an HTML body: tags dropped, entities decoded,
/// blank lines squeezed.
pub fn strip_tags(html: &str) -> String {
  let mut text = String::with_capacity(html.len());
  let mut in_tag = false;
  for ch in html.chars() {
    match ch {
      '<' => in_tag = true,
      '>' if in_tag => in_tag = false,
      _ if !in_tag => text.push(ch),
      _ => (),
    }
  }
  html_escape::decode_html_entities(&text)
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strip_tags_keeps_text() {
    let html = "<html>\n  <body>\n    <h1>Gran Final</h1>\n    <p>Lee <a href=\"x\">aquí</a></p>\n  </body>\n</html>";
    assert_eq!(strip_tags(html), "Gran Final\nLee aquí");
  }

  #[test]
  fn strip_tags_decodes_entities() {
    let html = "<h1>Tom &amp; Jerry &lt;3</h1><p>&quot;Hola&quot;</p>";
    assert_eq!(strip_tags(html), "Tom & Jerry <3\"Hola\"");
  }

  #[test]
  fn message_shape() {
    let mut table = std::collections::HashMap::new();
    table.insert("from_email".to_string(), config::Value::from("news@example.com"));
    let mailer = Mailjet::from_config(&Table::from(table)).unwrap();
    let msg = mailer.message("a@b.c", "Hola", "<p>Hola</p>");
    assert_eq!(msg["Messages"][0]["From"]["Email"], "news@example.com");
    assert_eq!(msg["Messages"][0]["From"]["Name"], DEFAULT_FROM_NAME);
    assert_eq!(msg["Messages"][0]["To"][0]["Email"], "a@b.c");
    assert_eq!(msg["Messages"][0]["TextPart"], "Hola");
  }
}
