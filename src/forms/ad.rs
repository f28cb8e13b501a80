use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::*;
use crate::forms::*;
use crate::models::Ad;

#[derive(Debug, Serialize, Deserialize)]
pub struct AdOut<T> {
  pub ad: T,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdList<T> {
  pub ads: Vec<T>,
  pub ads_count: usize,
}

impl<T> From<Vec<T>> for AdList<T> {
  fn from(ads: Vec<T>) -> Self {
    AdList {
      ads_count: ads.len(),
      ads,
    }
  }
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AdQuery {
  pub article: Option<i32>,
  pub limit: Option<i64>,
  pub offset: Option<i64>,
}

impl AdQuery {
  pub fn page(&self) -> Pagination {
    Pagination { limit: self.limit, offset: self.offset }
  }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Validate)]
pub struct CreateAd {
  pub article_id: i32,
  #[validate(
    custom(function = "not_blank"),
    length(max = 50, message = "is too long (maximum is 50 characters)")
  )]
  pub kind: String,
  pub starts_on: NaiveDate,
  pub ends_on: NaiveDate,
  #[validate(
    url(message = "is not a valid URL"),
    length(max = 500, message = "is too long (maximum is 500 characters)")
  )]
  pub target_url: String,
}

impl CreateAd {
  pub fn check_dates(&self) -> Result<()> {
    check_dates(self.starts_on, self.ends_on)
  }
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Validate)]
pub struct UpdateAd {
  pub article_id: Option<i32>,
  #[validate(
    custom(function = "not_blank"),
    length(max = 50, message = "is too long (maximum is 50 characters)")
  )]
  pub kind: Option<String>,
  pub starts_on: Option<NaiveDate>,
  pub ends_on: Option<NaiveDate>,
  #[validate(
    url(message = "is not a valid URL"),
    length(max = 500, message = "is too long (maximum is 500 characters)")
  )]
  pub target_url: Option<String>,
}

impl UpdateAd {
  /// Apply the given fields, then check the resulting campaign dates.
  pub fn apply(&self, ad: &mut Ad) -> Result<()> {
    if let Some(article_id) = self.article_id {
      ad.article_id = article_id;
    }
    if let Some(kind) = &self.kind {
      ad.kind = kind.trim().to_string();
    }
    if let Some(starts_on) = self.starts_on {
      ad.starts_on = starts_on;
    }
    if let Some(ends_on) = self.ends_on {
      ad.ends_on = ends_on;
    }
    if let Some(target_url) = &self.target_url {
      ad.target_url = target_url.clone();
    }
    check_dates(ad.starts_on, ad.ends_on)
  }
}

fn check_dates(starts_on: NaiveDate, ends_on: NaiveDate) -> Result<()> {
  if ends_on < starts_on {
    return Err(Error::invalid_field("ends_on", "can't be before starts_on"));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
  }

  fn form() -> CreateAd {
    CreateAd {
      article_id: 1,
      kind: "banner".into(),
      starts_on: day(1),
      ends_on: day(31),
      target_url: "https://tienda.example.com/promo".into(),
    }
  }

  #[test]
  fn valid_campaign() {
    let form = form();
    assert!(form.check().is_ok());
    assert!(form.check_dates().is_ok());
  }

  #[test]
  fn bad_fields_are_reported() {
    let form = CreateAd {
      kind: "k".repeat(51),
      target_url: "not a url".into(),
      ..form()
    };
    match form.check() {
      Err(Error::UnprocessableEntity(body)) => {
        assert_eq!(body["errors"]["kind"][0], "is too long (maximum is 50 characters)");
        assert_eq!(body["errors"]["target_url"][0], "is not a valid URL");
      },
      other => panic!("unexpected: {:?}", other),
    }
  }

  #[test]
  fn campaign_cannot_end_before_it_starts() {
    let form = CreateAd { starts_on: day(10), ends_on: day(9), ..form() };
    assert!(matches!(form.check_dates(), Err(Error::UnprocessableEntity(_))));

    let mut ad = Ad {
      id: 1,
      article_id: 1,
      kind: "banner".into(),
      starts_on: day(1),
      ends_on: day(5),
      target_url: "https://example.com".into(),
      impressions: 3,
      clicks: 1,
      created_at: day(1).and_hms_opt(0, 0, 0).unwrap(),
    };
    let update = UpdateAd { starts_on: Some(day(6)), ..Default::default() };
    assert!(update.apply(&mut ad).is_err());
    let update = UpdateAd { ends_on: Some(day(20)), kind: Some(" lateral ".into()), ..Default::default() };
    update.apply(&mut ad).unwrap();
    assert_eq!(ad.ends_on, day(20));
    assert_eq!(ad.kind, "lateral");
    assert_eq!(ad.impressions, 3);
  }
}
