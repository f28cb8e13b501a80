use log::*;

use std::collections::HashMap;

use actix_web::web;

use crate::error::*;
use crate::app::*;
use crate::auth::AuthData;
use crate::clients::Clients;
use crate::db::DbService;
use crate::models::{Article, Author};
use crate::newsletter::{notify_published, NewsletterReport};

mod article;
mod offering;
mod newsletter;
mod contact;
mod catalog;
mod upload;
mod ad;

type BoxService = Box<dyn Service>;

pub trait Service: ServiceClone + Send {
  /// Load Service config from AppConfig.
  fn load_app_config(&mut self, config: &AppConfig, prefix: &str) -> Result<()>;

  /// Setup Service endpoints.
  fn web_config(&self, _web: &mut web::ServiceConfig) {
  }

  fn api_config(&self, _web: &mut web::ServiceConfig) {
  }
}

pub trait ServiceClone {
  fn clone_box(&self) -> BoxService;
}

impl<T> ServiceClone for T
where
    T: 'static + Service + Clone,
{
  fn clone_box(&self) -> BoxService {
    Box::new(self.clone())
  }
}

impl Clone for BoxService {
  fn clone(&self) -> BoxService {
    self.clone_box()
  }
}

#[derive(Clone)]
pub struct Services {
  db_url: String,
  clients: Clients,
  services: Vec<BoxService>,
}

impl Services {
  fn load_service(name: &str, config: &AppConfig, prefix: &str) -> Result<BoxService> {
    let mut service: BoxService = match name {
      "Article" => Box::new(article::new_factory()),
      "Offering" => Box::new(offering::new_factory()),
      "Newsletter" => Box::new(newsletter::new_factory()),
      "Contact" => Box::new(contact::new_factory()),
      "Catalog" => Box::new(catalog::new_factory()),
      "Upload" => Box::new(upload::new_factory()),
      "Ad" => Box::new(ad::new_factory()),
      _ => {
        return Err(Error::BadRequest(format!("Unknown Service: {}", name)));
      },
    };

    service.load_app_config(config, prefix)?;
    Ok(service)
  }

  /// Load Service config from AppConfig.
  pub fn load_app_config(config: &AppConfig, prefix: &str) -> Result<Services> {
    // DB config
    let db_url = config.require_str("db.url")?;
    let clients = Clients::from_config(config)?;

    let mut loaded: HashMap<String, bool> = HashMap::new();
    let list = config.get_str_list(&format!("{}.services", prefix))?
      .ok_or_else(|| Error::BadRequest(format!("missing list of services for {}", prefix)))?;
    let mut services = Vec::with_capacity(list.len());
    for name in list.iter() {
      info!("Loading {}Service config", name);
      // check if it is loaded already.
      if loaded.insert(name.clone(), true).is_some() {
        return Err(Error::BadRequest(format!("service {} loaded multiple times", name)));
      }
      services.push(Self::load_service(name, config, prefix)?);
    }

    Ok(Services {
      db_url,
      clients,
      services,
    })
  }

  /// Setup Service endpoints. Runs once per worker.
  pub fn web_config(&self, web: &mut web::ServiceConfig) {
    // Create DbService for worker.
    match DbService::new(&self.db_url) {
      Ok(db) => {
        web.app_data(web::Data::new(db));
      },
      Err(err) => {
        error!("Failed to init db for worker: {}", err);
      },
    }
    web.app_data(web::Data::new(self.clients.clone()));

    for service in self.services.iter() {
      service.web_config(web);
    }
    web.service(
      web::scope("/api")
        .configure(|web| {
          for service in self.services.iter() {
            service.api_config(web);
          }
        })
    );
  }
}

/// The author linked to the authenticated account.
pub(crate) async fn current_author(db: &DbService, auth: &AuthData) -> Result<Author> {
  db.author.get_by_user_id(auth.user_id).await?
    .ok_or_else(|| Error::Unauthorized(json!({
      "error": "no author is linked to this account",
    })))
}

/// Mail `article` to the newsletter recipients. Failures never fail the caller.
pub(crate) async fn fan_out(db: &DbService, clients: &Clients, article: &Article) -> Option<NewsletterReport> {
  match db.newsletter.get_recipients().await {
    Ok(recipients) => {
      Some(notify_published(&clients.mail, &clients.site_url, article, &recipients).await)
    },
    Err(err) => {
      error!("Newsletter for article {} not sent: {}", article.id, err);
      None
    },
  }
}

/// Numeric id of a detail route key: `12` or `12-gran-final`.
pub(crate) fn parse_detail_key(key: &str) -> Option<i32> {
  let id = key.split('-').next()?;
  if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  id.parse().ok()
}

pub fn config_services(config: &AppConfig, prefix: &str) -> Result<Services> {
  Services::load_app_config(config, prefix)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detail_keys() {
    assert_eq!(parse_detail_key("12"), Some(12));
    assert_eq!(parse_detail_key("12-gran-final"), Some(12));
    assert_eq!(parse_detail_key("12-gran-final-2024"), Some(12));
    assert_eq!(parse_detail_key("gran-final"), None);
    assert_eq!(parse_detail_key("-12"), None);
    assert_eq!(parse_detail_key("+12"), None);
    assert_eq!(parse_detail_key(""), None);
    assert_eq!(parse_detail_key("99999999999"), None);
  }

  #[test]
  fn unknown_services_are_rejected() {
    let config = crate::app::test_config(r#"
      [db]
      url = "postgres://localhost/diario"

      [api]
      services = ["Article", "Bogus"]
    "#);
    assert!(config_services(&config, "api").is_err());

    let config = crate::app::test_config(r#"
      [db]
      url = "postgres://localhost/diario"

      [api]
      services = ["Article", "Article"]
    "#);
    assert!(config_services(&config, "api").is_err());
  }

  #[test]
  fn services_load_from_config() {
    let config = crate::app::test_config(r#"
      [db]
      url = "postgres://localhost/diario"

      [api]
      services = ["Article", "Offering", "Newsletter", "Contact", "Catalog", "Upload"]
    "#);
    let services = config_services(&config, "api").unwrap();
    assert_eq!(services.services.len(), 6);
  }
}
