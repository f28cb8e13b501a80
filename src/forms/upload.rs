use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::forms::*;

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Validate)]
pub struct UploadImage {
  /// Base64 image data, optionally as a `data:` URL.
  #[serde(default)]
  #[validate(custom(function = "not_blank"))]
  pub image: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UploadOut {
  pub url: String,
}
