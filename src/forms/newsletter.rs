use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Validate)]
pub struct Subscribe {
  #[serde(default)]
  #[validate(
    email(message = "is invalid"),
    length(max = 254, message = "is too long (maximum is 254 characters)")
  )]
  pub email: String,
  #[validate(length(max = 100, message = "is too long (maximum is 100 characters)"))]
  pub name: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Validate)]
pub struct CancelSubscription {
  #[serde(default)]
  #[validate(email(message = "is invalid"))]
  pub email: String,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SendNewsletter {
  pub article_id: i32,
}

#[cfg(test)]
mod tests {
  use super::*;

  use crate::error::Error;
  use crate::forms::CheckForm;

  #[test]
  fn subscribe_needs_an_email() {
    assert!(Subscribe::default().check().is_err());
    let form = Subscribe { email: "nope".into(), name: None };
    assert!(form.check().is_err());
    let form = Subscribe { email: "ana@example.com".into(), name: Some("Ana".into()) };
    assert!(form.check().is_ok());
    assert!(CancelSubscription { email: "ana".into() }.check().is_err());
  }

  #[test]
  fn subscriber_name_fits_the_column() {
    let form = Subscribe {
      email: "ana@example.com".into(),
      name: Some("n".repeat(101)),
    };
    match form.check() {
      Err(Error::UnprocessableEntity(body)) => {
        assert_eq!(body["errors"]["name"][0], "is too long (maximum is 100 characters)");
        assert!(body["errors"].get("email").is_none());
      },
      other => panic!("unexpected: {:?}", other),
    }
  }
}
