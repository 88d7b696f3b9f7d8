//! HTTP basic authentication.
//!
//! Every path except `/info` requires the configured credentials. The
//! authenticated username is attached to the request as [`AuthUser`] so
//! task-creating handlers can record who asked.

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use tracing::debug;

use crate::ApiState;
use crate::error::ApiError;

const CHALLENGE: &str = r#"Basic realm="BOSH Director""#;

/// Paths served without credentials.
const PUBLIC_PATHS: &[&str] = &["/info"];

/// Username and password accepted by the director.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// The user a request authenticated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

/// Decode an `Authorization: Basic …` header into `(user, password)`.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = BASE64_STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Middleware rejecting requests without valid basic-auth credentials.
pub async fn require_basic_auth(
    State(state): State<ApiState>,
    mut request: Request,
    next: Next,
) -> Response {
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    match basic_credentials(request.headers()) {
        Some((user, pass))
            if user == state.credentials.username && pass == state.credentials.password =>
        {
            request.extensions_mut().insert(AuthUser(user));
            next.run(request).await
        }
        _ => {
            debug!(path = %request.uri().path(), "rejected unauthenticated request");
            let mut response = ApiError::unauthorized().into_response();
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static(CHALLENGE));
            response
        }
    }
}
