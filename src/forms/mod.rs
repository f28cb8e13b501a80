use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::*;

pub mod article;
pub mod offering;
pub mod newsletter;
pub mod contact;
pub mod upload;
pub mod ad;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Request bodies checked with their derived field rules.
pub trait CheckForm: Validate {
  /// Run the field rules, failing with a 422 listing every bad field.
  fn check(&self) -> Result<()> {
    self.validate()?;
    Ok(())
  }
}

impl<T: Validate> CheckForm for T {}

pub fn is_blank(val: &str) -> bool {
  val.trim().is_empty()
}

/// Field rule: the value has some non-whitespace text.
pub fn not_blank(val: &str) -> std::result::Result<(), ValidationError> {
  if is_blank(val) {
    return Err(ValidationError::new("blank").with_message("can't be blank".into()));
  }
  Ok(())
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Pagination {
  pub limit: Option<i64>,
  pub offset: Option<i64>,
}

impl Pagination {
  pub fn limit(&self) -> i64 {
    clamp_limit(self.limit, DEFAULT_PAGE_SIZE)
  }

  pub fn offset(&self) -> i64 {
    self.offset.unwrap_or(0).max(0)
  }
}

/// `?limit=` for the fixed-policy listings ("most viewed", "recent", ...).
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LimitQuery {
  pub limit: Option<i64>,
}

pub fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
  limit.unwrap_or(default).max(1).min(MAX_PAGE_SIZE)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageOut {
  pub message: String,
}

impl MessageOut {
  pub fn new(message: &str) -> Self {
    MessageOut { message: message.to_string() }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Validate)]
  struct Named {
    #[validate(custom(function = "not_blank"), length(max = 5, message = "is too long"))]
    name: String,
  }

  #[test]
  fn blank_and_long_values_fail() {
    assert!(Named { name: "Ana".into() }.check().is_ok());
    match (Named { name: "   ".into() }).check() {
      Err(Error::UnprocessableEntity(body)) => {
        assert_eq!(body["errors"]["name"][0], "can't be blank");
      },
      other => panic!("unexpected: {:?}", other),
    }
    match (Named { name: "Anastasia".into() }).check() {
      Err(Error::UnprocessableEntity(body)) => {
        assert_eq!(body["errors"]["name"][0], "is too long");
      },
      other => panic!("unexpected: {:?}", other),
    }
  }

  #[test]
  fn pagination_bounds() {
    let page = Pagination::default();
    assert_eq!(page.limit(), DEFAULT_PAGE_SIZE);
    assert_eq!(page.offset(), 0);
    let page = Pagination { limit: Some(1000), offset: Some(-5) };
    assert_eq!(page.limit(), MAX_PAGE_SIZE);
    assert_eq!(page.offset(), 0);
    assert_eq!(clamp_limit(Some(0), 10), 1);
  }
}
