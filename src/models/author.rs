use chrono::NaiveDateTime;

use serde::{Deserialize, Serialize};

/// A staff member allowed to write articles ("trabajador").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Author {
  pub id: i32,
  #[serde(skip)]
  pub user_id: i32,
  pub email: String,
  pub first_name: String,
  pub last_name: String,
  pub photo_url: String,
  pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorProfile {
  pub id: i32,
  pub first_name: String,
  pub last_name: String,
  pub photo_url: String,
}

impl From<Author> for AuthorProfile {
  fn from(author: Author) -> Self {
    AuthorProfile {
      id: author.id,
      first_name: author.first_name,
      last_name: author.last_name,
      photo_url: author.photo_url,
    }
  }
}
