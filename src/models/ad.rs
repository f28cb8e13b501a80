use chrono::{NaiveDate, NaiveDateTime};

use serde::{Deserialize, Serialize};

/// An advertising slot shown alongside one article ("publicidad").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ad {
  pub id: i32,
  pub article_id: i32,
  pub kind: String,
  pub starts_on: NaiveDate,
  pub ends_on: NaiveDate,
  pub target_url: String,
  pub impressions: i64,
  pub clicks: i64,
  pub created_at: NaiveDateTime,
}

impl Ad {
  /// Both ends of the campaign are inclusive.
  pub fn is_running(&self, today: NaiveDate) -> bool {
    self.starts_on <= today && today <= self.ends_on
  }
}
