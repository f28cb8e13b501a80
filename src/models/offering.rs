use chrono::NaiveDateTime;

use serde::{Deserialize, Serialize};

use crate::slug::{Sluggable, SlugPolicy};

/// Fixed service categories, seeded with stable ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferingCategory {
  StrategicConsulting,
  SpecializedTraining,
}

impl OfferingCategory {
  pub const ALL: [OfferingCategory; 2] = [
    OfferingCategory::StrategicConsulting,
    OfferingCategory::SpecializedTraining,
  ];

  pub fn id(self) -> i32 {
    match self {
      OfferingCategory::StrategicConsulting => 1,
      OfferingCategory::SpecializedTraining => 2,
    }
  }

  pub fn from_id(id: i32) -> Option<Self> {
    Self::ALL.iter().copied().find(|cat| cat.id() == id)
  }

  pub fn name(self) -> &'static str {
    match self {
      OfferingCategory::StrategicConsulting => "consultoria_estrategica",
      OfferingCategory::SpecializedTraining => "capacitaciones_especializadas",
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      OfferingCategory::StrategicConsulting => "Consultoría Estratégica",
      OfferingCategory::SpecializedTraining => "Capacitaciones Especializadas",
    }
  }
}

impl Default for OfferingCategory {
  fn default() -> Self {
    OfferingCategory::StrategicConsulting
  }
}

/// A service listing ("servicio").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Offering {
  pub id: i32,
  pub title: String,
  pub description: Option<String>,
  pub keywords: Option<String>,
  pub image_url: Option<String>,
  pub category: OfferingCategory,
  pub active: bool,
  pub slug: String,
  pub created_at: NaiveDateTime,
  pub updated_at: NaiveDateTime,
}

impl Sluggable for Offering {
  const ROUTE: &'static str = "servicios";
  const SLUG_POLICY: SlugPolicy = SlugPolicy {
    fallback: "servicio",
    max_len: 250,
  };

  fn id(&self) -> i32 {
    self.id
  }

  fn slug(&self) -> &str {
    &self.slug
  }
}

/// Row of a fixed lookup table, as served by the catalog endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
  pub id: i32,
  pub name: String,
  pub label: String,
}

impl From<OfferingCategory> for CatalogEntry {
  fn from(cat: OfferingCategory) -> Self {
    CatalogEntry {
      id: cat.id(),
      name: cat.name().to_string(),
      label: cat.label().to_string(),
    }
  }
}

impl From<crate::models::PublicationState> for CatalogEntry {
  fn from(state: crate::models::PublicationState) -> Self {
    CatalogEntry {
      id: state.id(),
      name: state.name().to_string(),
      label: state.label().to_string(),
    }
  }
}
