use chrono::NaiveDateTime;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscriber {
  pub id: i32,
  pub email: String,
  pub name: Option<String>,
  pub subscribed_at: NaiveDateTime,
  pub active: bool,
  #[serde(skip)]
  pub confirmation_token: String,
  pub confirmed: bool,
}

impl Subscriber {
  /// Only active, confirmed subscribers receive newsletters.
  pub fn receives_newsletter(&self) -> bool {
    self.active && self.confirmed
  }
}
