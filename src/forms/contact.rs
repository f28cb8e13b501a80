use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::forms::*;

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Validate)]
pub struct CreateContact {
  #[serde(default)]
  #[validate(
    custom(function = "not_blank"),
    length(max = 100, message = "is too long (maximum is 100 characters)")
  )]
  pub name: String,
  #[serde(default)]
  #[validate(
    email(message = "is invalid"),
    length(max = 254, message = "is too long (maximum is 254 characters)")
  )]
  pub email: String,
  #[serde(default)]
  #[validate(
    custom(function = "not_blank"),
    length(max = 200, message = "is too long (maximum is 200 characters)")
  )]
  pub subject: String,
  #[serde(default)]
  #[validate(custom(function = "not_blank"))]
  pub message: String,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ContactQuery {
  pub read: Option<bool>,
  pub replied: Option<bool>,
  pub limit: Option<i64>,
  pub offset: Option<i64>,
}

impl ContactQuery {
  pub fn page(&self) -> Pagination {
    Pagination { limit: self.limit, offset: self.offset }
  }
}
