//! # Token Authentication Middleware
//!
//! Binds a [`CallerIdentity`] to every request that presents a valid token.
//!
//! ## Token transport
//!
//! The token is looked up under the key `Authorization`, then under `token`.
//! For each key the query string is consulted before the headers, and the
//! first non-empty value wins. A leading `Bearer ` is stripped:
//!
//! ```text
//! GET /user/info?Authorization=Bearer%20<jwt>
//! GET /user/info            Authorization: Bearer <jwt>
//! GET /user/info            token: <jwt>
//! ```
//!
//! ## Sliding renewal
//!
//! When the presented token is within the last third of the lifetime for the
//! request's `Device-Type`, a fresh token is issued and returned in the
//! `new-token` response header. The presented token remains valid until its
//! own expiry.

use std::collections::HashMap;

use axum::extract::{Query, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use warden_core::{Claims, DeviceClass, ErrorKind, UniCode};

use crate::error::AppError;
use crate::state::AppState;

/// Keys searched for a token, in order.
const TOKEN_KEYS: [&str; 2] = ["Authorization", "token"];

/// Response header carrying a renewed token.
pub const NEW_TOKEN_HEADER: HeaderName = HeaderName::from_static("new-token");

/// Request header naming the client's device class.
pub const DEVICE_TYPE_HEADER: HeaderName = HeaderName::from_static("device-type");

/// Identity of the authenticated caller, bound by [`auth_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub uni_code: UniCode,
    pub device: DeviceClass,
    pub claims: Claims,
}

/// Extracts the identity that the auth middleware injected into extensions.
///
/// Returns 401 if no identity is present.
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| {
                AppError::new(ErrorKind::Unauthorized).append("no caller identity in request context")
            })
    }
}

/// Device class announced by the `Device-Type` header.
pub fn device_class(headers: &HeaderMap) -> DeviceClass {
    DeviceClass::from_header(
        headers
            .get(&DEVICE_TYPE_HEADER)
            .and_then(|v| v.to_str().ok()),
    )
}

/// Locate the bearer token in the query string or headers.
pub fn extract_token(uri: &Uri, headers: &HeaderMap) -> Result<String, AppError> {
    let query: HashMap<String, String> = Query::try_from_uri(uri)
        .map(|Query(q)| q)
        .unwrap_or_default();

    for key in TOKEN_KEYS {
        let from_query = query.get(key).map(String::as_str);
        let from_header = headers.get(key).and_then(|v| v.to_str().ok());

        for raw in [from_query, from_header].into_iter().flatten() {
            let token = strip_bearer(raw);
            if !token.is_empty() {
                return Ok(token.to_string());
            }
        }
    }
    Err(AppError::new(ErrorKind::TokenNotFound))
}

fn strip_bearer(raw: &str) -> &str {
    let raw = raw.trim();
    match raw.strip_prefix("Bearer") {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim(),
        _ => raw,
    }
}

/// Verify the request's token, bind the caller, and attach a renewed token
/// to the response when one is due.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match extract_token(request.uri(), request.headers()) {
        Ok(token) => token,
        Err(err) => {
            tracing::warn!(path = %request.uri().path(), "authentication failed: no token");
            return err.into_response();
        }
    };

    let claims = match state.tokens.verify(&token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(error = %e, "authentication failed: token rejected");
            return AppError::from(e).into_response();
        }
    };

    let device = device_class(request.headers());
    let renewed = match state.tokens.renew(&claims, device) {
        Ok(renewed) => renewed,
        Err(e) => {
            tracing::error!(error = %e, "token renewal failed");
            None
        }
    };

    request.extensions_mut().insert(CallerIdentity {
        uni_code: claims.subject(),
        device,
        claims,
    });

    let mut response = next.run(request).await;

    if let Some(token) = renewed {
        match HeaderValue::from_str(&token) {
            Ok(value) => {
                tracing::debug!(device = device.as_str(), "issued renewed token");
                response.headers_mut().insert(NEW_TOKEN_HEADER, value);
            }
            Err(e) => tracing::error!(error = %e, "renewed token is not a valid header value"),
        }
    }
    response
}
