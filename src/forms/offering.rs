use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::*;
use crate::forms::*;
use crate::models::*;

#[derive(Debug, Serialize, Deserialize)]
pub struct OfferingOut<T> {
  pub service: T,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferingList<T> {
  pub services: Vec<T>,
  pub services_count: usize,
}

impl<T> From<Vec<T>> for OfferingList<T> {
  fn from(services: Vec<T>) -> Self {
    OfferingList {
      services_count: services.len(),
      services,
    }
  }
}

/// `services.title` column width.
pub const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Validate)]
pub struct CreateOffering {
  #[serde(default)]
  #[validate(
    custom(function = "not_blank"),
    length(max = 200, message = "is too long (maximum is 200 characters)")
  )]
  pub title: String,
  pub description: Option<String>,
  pub keywords: Option<String>,
  /// Hosted URL or base64 image data to upload.
  pub image: Option<String>,
  pub category_id: Option<i32>,
  pub active: Option<bool>,
}

impl CreateOffering {
  /// Resolve the category; missing means the default one.
  pub fn category(&self) -> Result<OfferingCategory> {
    Ok(resolve_category(self.category_id)?.unwrap_or_default())
  }
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Validate)]
pub struct UpdateOffering {
  #[validate(
    custom(function = "not_blank"),
    length(max = 200, message = "is too long (maximum is 200 characters)")
  )]
  pub title: Option<String>,
  pub description: Option<String>,
  pub keywords: Option<String>,
  pub image: Option<String>,
  pub category_id: Option<i32>,
  pub active: Option<bool>,
}

impl UpdateOffering {
  /// Resolve the new category, if one was given.
  pub fn category(&self) -> Result<Option<OfferingCategory>> {
    resolve_category(self.category_id)
  }

  /// Apply every field except the title and image to `offering`.
  pub fn apply(&self, offering: &mut Offering, category: Option<OfferingCategory>) {
    if let Some(description) = &self.description {
      offering.description = Some(description.clone());
    }
    if let Some(keywords) = &self.keywords {
      offering.keywords = Some(keywords.clone());
    }
    if let Some(category) = category {
      offering.category = category;
    }
    if let Some(active) = self.active {
      offering.active = active;
    }
  }
}

fn resolve_category(id: Option<i32>) -> Result<Option<OfferingCategory>> {
  match id {
    Some(id) => OfferingCategory::from_id(id)
      .map(Some)
      .ok_or_else(|| Error::invalid_field("category_id", &format!("unknown category {}", id))),
    None => Ok(None),
  }
}

/// Values for a new `services` row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOffering {
  pub title: String,
  pub description: Option<String>,
  pub keywords: Option<String>,
  pub image_url: Option<String>,
  pub category: OfferingCategory,
  pub active: bool,
}
