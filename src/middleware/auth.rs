use log::*;

use std::future::{ready, Ready};

use futures::future::LocalBoxFuture;

use actix_web::{
  body::EitherBody,
  http::header::{HeaderMap, AUTHORIZATION},
  Error as ActixError, HttpMessage,
  HttpResponse, ResponseError,
  HttpRequest, FromRequest,
};
use actix_web::dev::{
  forward_ready,
  Service, Transform,
  ServiceRequest, ServiceResponse,
  Payload,
};

use crate::error::*;
use crate::auth::*;

const TOKEN_PREFIXES: [&str; 2] = ["Token ", "Bearer "];

fn unauthorized(message: &str) -> Error {
  Error::Unauthorized(json!({ "error": message }))
}

pub fn decode_jwt_claims(headers: &HeaderMap) -> Result<Option<AuthData>> {
  let header = match headers.get(AUTHORIZATION) {
    Some(header) => header.to_str()
      .map_err(|_| unauthorized("Invalid authorization token"))?,
    // No authorization provided.  Allow caller to decide if this is an error.
    None => return Ok(None),
  };

  let token = TOKEN_PREFIXES.iter()
    .find_map(|prefix| header.strip_prefix(prefix))
    .ok_or_else(|| unauthorized("Invalid authorization method"))?;

  match token.trim().decode_jwt() {
    Ok(auth_data) => Ok(Some(auth_data)),
    Err(Error::JwtError { source }) => {
      debug!("Rejected token: {}", source);
      Err(unauthorized("Invalid authorization token"))
    },
    Err(err) => Err(err),
  }
}

impl FromRequest for AuthData {
  type Error = ActixError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
    match req.extensions().get::<AuthData>() {
      Some(auth) => ready(Ok(auth.clone())),
      None => ready(Err(unauthorized("authorization required").into())),
    }
  }
}

pub struct Auth {
  pub is_optional: bool,
}

impl Auth {
  pub fn required() -> Self {
    Self {
      is_optional: false,
    }
  }

  pub fn optional() -> Self {
    Self {
      is_optional: true,
    }
  }
}

impl<S, B> Transform<S, ServiceRequest> for Auth
where
  S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError>,
  S::Future: 'static,
  B: 'static,
{
  type Response = ServiceResponse<EitherBody<B>>;
  type Error = ActixError;
  type InitError = ();
  type Transform = AuthMiddleware<S>;
  type Future = Ready<Result<Self::Transform, Self::InitError>>;

  fn new_transform(&self, service: S) -> Self::Future {
    ready(Ok(AuthMiddleware {
      is_optional: self.is_optional,
      service,
    }))
  }
}

pub struct AuthMiddleware<S> {
  is_optional: bool,
  service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
  S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError>,
  S::Future: 'static,
  B: 'static,
{
  type Response = ServiceResponse<EitherBody<B>>;
  type Error = ActixError;
  type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

  forward_ready!(service);

  fn call(&self, req: ServiceRequest) -> Self::Future {
    let has_auth = match decode_jwt_claims(req.headers()) {
      Ok(Some(auth_data)) => {
        debug!("Has authorization token for user {}", auth_data.user_id);
        req.extensions_mut().insert(auth_data);
        true
      },
      Ok(None) => {
        debug!("No authorization token");
        false
      },
      Err(err) => {
        warn!("Error getting JWT claims: {}", err);
        let res = req.into_response(err.error_response()).map_into_right_body();
        return Box::pin(async move { Ok(res) });
      },
    };

    debug!("Auth check: has_auth={}, optional={}", has_auth, self.is_optional);
    if has_auth || self.is_optional {
      let fut = self.service.call(req);
      Box::pin(async move {
        fut.await.map(ServiceResponse::map_into_left_body)
      })
    } else {
      let res = req.into_response(
        HttpResponse::Unauthorized().json(json!({
          "error": "authorization required",
        }))
      ).map_into_right_body();
      Box::pin(async move { Ok(res) })
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use actix_web::{test, web, App, http::StatusCode};

  use crate::auth::jwt::encode_for_test;

  const SECRET: &str = "middleware-test-secret";

  async fn whoami(auth: Option<AuthData>) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "user": auth.map(|a| a.user_id) }))
  }

  async fn private(auth: AuthData) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "user": auth.user_id }))
  }

  fn set_secret() {
    std::env::set_var("JWT_SECRET", SECRET);
  }

  #[actix_rt::test]
  async fn optional_auth_passes_anonymous_requests() {
    set_secret();
    let app = test::init_service(
      App::new().wrap(Auth::optional())
        .route("/", web::get().to(whoami))
        .route("/private", web::get().to(private))
    ).await;

    let resp: serde_json::Value = test::call_and_read_body_json(&app,
      test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp["user"], serde_json::Value::Null);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/private").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[actix_rt::test]
  async fn token_and_bearer_prefixes_are_accepted() {
    set_secret();
    let app = test::init_service(
      App::new().wrap(Auth::required()).route("/", web::get().to(private))
    ).await;
    let token = encode_for_test(7, SECRET);

    for prefix in TOKEN_PREFIXES.iter() {
      let req = test::TestRequest::get().uri("/")
        .insert_header((AUTHORIZATION, format!("{}{}", prefix, token)))
        .to_request();
      let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
      assert_eq!(resp["user"], 7);
    }
  }

  #[actix_rt::test]
  async fn required_auth_rejects_missing_and_bad_tokens() {
    set_secret();
    let app = test::init_service(
      App::new().wrap(Auth::required()).route("/", web::get().to(private))
    ).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get().uri("/")
      .insert_header((AUTHORIZATION, "Token not-a-jwt"))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get().uri("/")
      .insert_header((AUTHORIZATION, "Basic abc"))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }
}
