use serde::{Deserialize, Serialize};

use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::error::*;

/// The authenticated caller. `user_id` is the account id carried by the token,
/// matched against `authors.user_id`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AuthData {
  pub user_id: i32,
  pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
  pub id: i32,
  pub exp: i64,
}

pub trait DecodeJwt {
  fn decode_jwt(&self) -> Result<AuthData>;
}

impl DecodeJwt for str {
  fn decode_jwt(&self) -> Result<AuthData> {
    decode_with_secret(self, &get_secret()?)
  }
}

pub fn decode_with_secret(token: &str, secret: &str) -> Result<AuthData> {
  let secret_key = DecodingKey::from_secret(secret.as_ref());
  let token_data = decode::<Claims>(token, &secret_key, &Validation::default())?;
  Ok(AuthData {
    user_id: token_data.claims.id,
    token: token.to_string(),
  })
}

fn get_secret() -> Result<String> {
  dotenv::var("JWT_SECRET").map_err(|_| {
    log::error!("Missing JWT_SECRET environment variable.");
    Error::InternalServerError
  })
}

#[cfg(test)]
pub(crate) fn encode_for_test(user_id: i32, secret: &str) -> String {
  use jsonwebtoken::{encode, EncodingKey, Header};

  let claims = Claims {
    id: user_id,
    exp: (chrono::Utc::now() + chrono::Duration::days(1)).timestamp(),
  };
  encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
    .expect("encode token")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decodes_valid_tokens() {
    let token = encode_for_test(42, "s3cret");
    let auth = decode_with_secret(&token, "s3cret").unwrap();
    assert_eq!(auth.user_id, 42);
    assert_eq!(auth.token, token);
  }

  #[test]
  fn rejects_wrong_secret() {
    let token = encode_for_test(42, "s3cret");
    assert!(matches!(decode_with_secret(&token, "other"), Err(Error::JwtError { .. })));
  }
}
