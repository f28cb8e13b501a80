use chrono::NaiveDateTime;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactMessage {
  pub id: i32,
  pub name: String,
  pub email: String,
  pub subject: String,
  pub message: String,
  pub sent_at: NaiveDateTime,
  pub read: bool,
  pub replied: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContactStats {
  pub total: i64,
  pub unread: i64,
  pub unreplied: i64,
}
