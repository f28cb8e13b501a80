use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::*;
use crate::forms::*;
use crate::models::*;
use crate::newsletter::NewsletterReport;

#[derive(Debug, Serialize, Deserialize)]
pub struct ArticleOut<T> {
  pub article: T,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleList<T> {
  pub articles: Vec<T>,
  pub articles_count: usize,
}

impl<T> From<Vec<T>> for ArticleList<T> {
  fn from(articles: Vec<T>) -> Self {
    ArticleList {
      articles_count: articles.len(),
      articles,
    }
  }
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ArticleQuery {
  pub state: Option<i32>,
  pub author: Option<i32>,
  pub limit: Option<i64>,
  pub offset: Option<i64>,
}

impl ArticleQuery {
  pub fn page(&self) -> Pagination {
    Pagination { limit: self.limit, offset: self.offset }
  }
}

fn default_true() -> bool {
  true
}

/// `articles.title` column width.
pub const MAX_TITLE_LEN: usize = 500;

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Validate)]
pub struct CreateArticle {
  /// Defaults to the author linked to the caller's account.
  pub author_id: Option<i32>,
  #[serde(default)]
  #[validate(
    custom(function = "not_blank"),
    length(max = 500, message = "is too long (maximum is 500 characters)")
  )]
  pub title: String,
  #[serde(default)]
  pub subtitle: String,
  #[serde(default)]
  #[validate(custom(function = "not_blank"))]
  pub body: String,
  #[serde(default)]
  pub keywords: String,
  pub published_on: Option<NaiveDate>,
  pub state_id: Option<i32>,
  #[serde(default)]
  pub subscribers_only: bool,
  #[serde(default = "default_true")]
  pub show_credits: bool,
  #[serde(default)]
  pub editor_ids: Vec<i32>,
  /// Hosted URLs or base64 image data to upload.
  #[serde(default)]
  #[validate(
    length(max = 6, message = "at most 6 images are allowed"),
    custom(function = "no_blank_images")
  )]
  pub images: Vec<String>,
}

impl CreateArticle {
  pub fn state(&self) -> PublicationState {
    self.state_id.map(PublicationState::from_id_or_draft)
      .unwrap_or(PublicationState::Draft)
  }
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Validate)]
pub struct UpdateArticle {
  #[validate(
    custom(function = "not_blank"),
    length(max = 500, message = "is too long (maximum is 500 characters)")
  )]
  pub title: Option<String>,
  pub subtitle: Option<String>,
  #[validate(custom(function = "not_blank"))]
  pub body: Option<String>,
  pub keywords: Option<String>,
  pub published_on: Option<NaiveDate>,
  pub state_id: Option<i32>,
  pub subscribers_only: Option<bool>,
  pub show_credits: Option<bool>,
  pub editor_ids: Option<Vec<i32>>,
  #[validate(
    length(max = 6, message = "at most 6 images are allowed"),
    custom(function = "no_blank_images")
  )]
  pub images: Option<Vec<String>>,
}

impl UpdateArticle {
  /// Apply every field except the title and images to `article`.
  /// The title goes through slug assignment, images through the image host.
  pub fn apply(&self, article: &mut Article) {
    if let Some(subtitle) = &self.subtitle {
      article.subtitle = subtitle.clone();
    }
    if let Some(body) = &self.body {
      article.body = body.clone();
    }
    if let Some(keywords) = &self.keywords {
      article.keywords = keywords.clone();
    }
    if let Some(published_on) = self.published_on {
      article.published_on = published_on;
    }
    if let Some(state_id) = self.state_id {
      article.state = PublicationState::from_id_or_draft(state_id);
    }
    if let Some(subscribers_only) = self.subscribers_only {
      article.subscribers_only = subscribers_only;
    }
    if let Some(show_credits) = self.show_credits {
      article.show_credits = show_credits;
    }
    if let Some(editor_ids) = &self.editor_ids {
      article.editor_ids = editor_ids.clone();
    }
  }
}

fn no_blank_images(images: &[String]) -> std::result::Result<(), ValidationError> {
  if images.iter().any(|img| is_blank(img)) {
    return Err(ValidationError::new("blank")
      .with_message("can't contain blank entries".into()));
  }
  Ok(())
}

/// Values for a new `articles` row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
  pub author_id: i32,
  pub title: String,
  pub subtitle: String,
  pub body: String,
  pub keywords: String,
  pub published_on: NaiveDate,
  pub state: PublicationState,
  pub subscribers_only: bool,
  pub show_credits: bool,
  pub editor_ids: Vec<i32>,
  pub images: Vec<String>,
}

/// Response to a write. `newsletter` is present when the write published the article.
#[derive(Debug, Serialize)]
pub struct ArticleSaved {
  pub article: Article,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub newsletter: Option<NewsletterReport>,
}
