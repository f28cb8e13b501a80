use log::*;

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::{Map, Value as JsonValue};
use validator::ValidationErrors;

use jsonwebtoken::errors::Error as JwtError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
  // 401
  #[error("unauthorized: {0}")]
  Unauthorized(JsonValue),

  // 404
  #[error("not found: {0}")]
  NotFound(JsonValue),

  // 422
  #[error("unprocessable entity: {0}")]
  UnprocessableEntity(JsonValue),

  // 500
  #[error("internal server error")]
  InternalServerError,

  // 400
  #[error("bad request: {0}")]
  BadRequest(String),

  // 409, unique constraint hit by a concurrent write.
  #[error("conflict: {0}")]
  Conflict(String),

  // 502, an external API refused a call the request depends on.
  #[error("upstream error: {0}")]
  Upstream(String),

  // Json error
  #[error("Json error: {source}")]
  JsonError {
    #[from]
    source: serde_json::Error,
  },

  #[error("JWT error")]
  JwtError {
    #[from]
    source: JwtError,
  },

  #[error("disconnected: {0}")]
  DisconnectedError(String),

  #[error("postgres error")]
  PgError {
    #[from]
    source: tokio_postgres::error::Error,
  },

  #[error("http client error")]
  HttpError {
    #[from]
    source: reqwest::Error,
  },

  #[error("std io error")]
  IOError {
    #[from]
    source: std::io::Error,
  },

  #[error("config error")]
  ConfigError {
    #[from]
    source: config::ConfigError,
  },

  #[error(transparent)]
  Other(#[from] anyhow::Error),
}

impl Error {
  /// Validation failure for a single field, in the `{"errors": {field: [msg]}}` shape.
  pub fn invalid_field(field: &str, message: &str) -> Self {
    Error::UnprocessableEntity(json!({
      "errors": { (field): [message] },
    }))
  }

  pub fn not_found(what: &str) -> Self {
    Error::NotFound(json!({
      "error": format!("{} not found", what),
    }))
  }
}

/// Field rule failures become `{"errors": {field: [message, ...]}}`.
impl From<ValidationErrors> for Error {
  fn from(errors: ValidationErrors) -> Self {
    let mut fields = Map::new();
    for (field, errs) in errors.field_errors() {
      let messages = errs.iter()
        .map(|err| match err.message {
          Some(ref message) => json!(message),
          None => json!(err.code),
        })
        .collect();
      fields.insert(field.to_string(), JsonValue::Array(messages));
    }
    Error::UnprocessableEntity(json!({ "errors": JsonValue::Object(fields) }))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// the ResponseError trait lets us convert errors to http responses with appropriate data
// https://actix.rs/docs/errors/
impl ResponseError for Error {
  fn status_code(&self) -> StatusCode {
    match self {
      Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      Error::NotFound(_) => StatusCode::NOT_FOUND,
      Error::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
      Error::BadRequest(_) => StatusCode::BAD_REQUEST,
      Error::Conflict(_) => StatusCode::CONFLICT,
      Error::DisconnectedError(_) | Error::Upstream(_) => StatusCode::BAD_GATEWAY,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    match self {
      Error::Unauthorized(ref message)
      | Error::NotFound(ref message)
      | Error::UnprocessableEntity(ref message) => {
        HttpResponse::build(status).json(message)
      },
      Error::BadRequest(ref message)
      | Error::Conflict(ref message)
      | Error::DisconnectedError(ref message)
      | Error::Upstream(ref message) => {
        HttpResponse::build(status).json(json!({ "error": message }))
      },
      ref err => {
        error!("InternalServerError: {:?}", err);
        HttpResponse::InternalServerError().json(json!({ "error": "Internal Server Error" }))
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn validation_errors_carry_the_field() {
    let err = Error::invalid_field("title", "can't be blank");
    assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    match err {
      Error::UnprocessableEntity(body) => {
        assert_eq!(body["errors"]["title"][0], "can't be blank");
      },
      other => panic!("unexpected error: {:?}", other),
    }
  }

  #[test]
  fn rule_failures_are_reported_per_field() {
    let mut errors = ValidationErrors::new();
    let mut too_long = validator::ValidationError::new("length");
    too_long.message = Some("is too long (maximum is 100 characters)".into());
    errors.add("name", too_long);
    errors.add("email", validator::ValidationError::new("email"));

    let err = Error::from(errors);
    assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    match err {
      Error::UnprocessableEntity(body) => {
        assert_eq!(body["errors"]["name"][0], "is too long (maximum is 100 characters)");
        assert_eq!(body["errors"]["email"][0], "email");
      },
      other => panic!("unexpected error: {:?}", other),
    }
  }

  #[test]
  fn status_mapping() {
    assert_eq!(Error::not_found("article").status_code(), StatusCode::NOT_FOUND);
    assert_eq!(Error::Conflict("slug".into()).status_code(), StatusCode::CONFLICT);
    assert_eq!(Error::Upstream("mailjet".into()).status_code(), StatusCode::BAD_GATEWAY);
    assert_eq!(Error::InternalServerError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn internal_errors_hide_details() {
    let err = Error::Other(anyhow::anyhow!("secret table name"));
    let resp = err.error_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
  }
}
