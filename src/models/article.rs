use chrono::{NaiveDate, NaiveDateTime};

use serde::{Deserialize, Serialize};

use crate::models::*;
use crate::slug::{Sluggable, SlugPolicy};
use crate::visits::VisitCounters;

/// Articles may carry at most this many hosted images.
pub const MAX_ARTICLE_IMAGES: usize = 6;

/// Lifecycle state of an article. The ids are stable and seeded at startup,
/// so clients may hardcode them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationState {
  Draft,
  Trashed,
  Published,
  ReadyToEdit,
}

impl PublicationState {
  pub const ALL: [PublicationState; 4] = [
    PublicationState::Draft,
    PublicationState::Trashed,
    PublicationState::Published,
    PublicationState::ReadyToEdit,
  ];

  pub fn id(self) -> i32 {
    match self {
      PublicationState::Draft => 1,
      PublicationState::Trashed => 2,
      PublicationState::Published => 3,
      PublicationState::ReadyToEdit => 4,
    }
  }

  pub fn from_id(id: i32) -> Option<Self> {
    Self::ALL.iter().copied().find(|state| state.id() == id)
  }

  /// Unknown ids fall back to `Draft`.
  pub fn from_id_or_draft(id: i32) -> Self {
    Self::from_id(id).unwrap_or_else(|| {
      log::info!("Unknown publication state {}, using draft", id);
      PublicationState::Draft
    })
  }

  pub fn name(self) -> &'static str {
    match self {
      PublicationState::Draft => "draft",
      PublicationState::Trashed => "trashed",
      PublicationState::Published => "published",
      PublicationState::ReadyToEdit => "ready_to_edit",
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      PublicationState::Draft => "Borrador",
      PublicationState::Trashed => "En Papelera",
      PublicationState::Published => "Publicado",
      PublicationState::ReadyToEdit => "Listo para editar",
    }
  }

  /// True when moving from `old` to `self` should notify subscribers.
  pub fn is_publish_transition(self, old: Option<PublicationState>) -> bool {
    self == PublicationState::Published && old != Some(PublicationState::Published)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
  pub id: i32,
  pub author: AuthorProfile,
  pub editor_ids: Vec<i32>,
  pub title: String,
  pub subtitle: String,
  pub body: String,
  pub keywords: String,
  pub slug: String,
  pub published_on: NaiveDate,
  pub state: PublicationState,
  pub subscribers_only: bool,
  pub show_credits: bool,
  pub images: Vec<String>,
  #[serde(flatten)]
  pub visits: VisitCounters,
  pub created_at: NaiveDateTime,
  pub updated_at: NaiveDateTime,
}

impl Article {
  pub fn lead_image(&self) -> Option<&str> {
    self.images.first().map(|s| s.as_str())
  }
}

impl Sluggable for Article {
  const ROUTE: &'static str = "noticias";
  const SLUG_POLICY: SlugPolicy = SlugPolicy {
    fallback: "noticia",
    max_len: 300,
  };

  fn id(&self) -> i32 {
    self.id
  }

  fn slug(&self) -> &str {
    &self.slug
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn state_ids_are_stable() {
    assert_eq!(PublicationState::Draft.id(), 1);
    assert_eq!(PublicationState::Trashed.id(), 2);
    assert_eq!(PublicationState::Published.id(), 3);
    assert_eq!(PublicationState::ReadyToEdit.id(), 4);
    for state in PublicationState::ALL.iter() {
      assert_eq!(PublicationState::from_id(state.id()), Some(*state));
    }
    assert_eq!(PublicationState::from_id_or_draft(42), PublicationState::Draft);
  }

  #[test]
  fn publish_transition() {
    use PublicationState::*;
    assert!(Published.is_publish_transition(None));
    assert!(Published.is_publish_transition(Some(Draft)));
    assert!(Published.is_publish_transition(Some(ReadyToEdit)));
    assert!(!Published.is_publish_transition(Some(Published)));
    assert!(!Draft.is_publish_transition(Some(Published)));
    assert!(!Trashed.is_publish_transition(None));
  }
}
