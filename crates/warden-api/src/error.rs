//! # API Error Types
//!
//! [`AppError`] pairs an [`ErrorKind`] from the core registry with a list of
//! detail strings and renders as the JSON body
//!
//! ```text
//! { "code": 1006, "message": "token invalid", "details": ["token expired"] }
//! ```
//!
//! Successful responses use the [`ApiResponse`] envelope
//! `{ "code": 0, "message": "success", "data": ... }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use warden_core::{ErrorKind, TokenError};
use warden_store::{CacheError, StoreError};

/// Structured JSON error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code from the error-kind registry.
    pub code: u32,
    /// Human-readable message.
    pub message: String,
    /// Additional context, most specific last.
    pub details: Vec<String>,
}

/// Application-level error that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}")]
pub struct AppError {
    kind: ErrorKind,
    details: Vec<String>,
}

impl AppError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            details: Vec::new(),
        }
    }

    /// Attach a detail line.
    pub fn append(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn details(&self) -> &[String] {
        &self.details
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.kind.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.kind.code(),
            message: self.kind.message().to_string(),
            details: self.details.clone(),
        }
    }
}

impl From<ErrorKind> for AppError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.kind.is_server_error() {
            tracing::error!(
                code = self.kind.code(),
                details = ?self.details,
                "internal server error"
            );
        } else {
            tracing::debug!(code = self.kind.code(), details = ?self.details, "request rejected");
        }
        (self.status(), Json(self.body())).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::new(ErrorKind::DatabaseError).append(err.to_string())
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        Self::new(ErrorKind::InternalServerError).append(err.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        let kind = match err {
            TokenError::Signing(_) => ErrorKind::TokenGenerateFailed,
            TokenError::Invalid(_) | TokenError::Expired | TokenError::NotYetValid => {
                ErrorKind::TokenInvalid
            }
        };
        Self::new(kind).append(err.to_string())
    }
}

/// Success envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Always `0`.
    pub code: u32,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[test]
    fn status_follows_kind() {
        assert_eq!(AppError::new(ErrorKind::TokenInvalid).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::new(ErrorKind::Forbidden).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::new(ErrorKind::TooManyRequests).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::new(ErrorKind::RoleNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn append_accumulates_in_order() {
        let err = AppError::new(ErrorKind::BadRequest)
            .append("first")
            .append("second");
        assert_eq!(err.details(), ["first", "second"]);
    }

    #[test]
    fn display_uses_registry_message() {
        let err = AppError::new(ErrorKind::TokenNotFound);
        assert_eq!(err.to_string(), "token not found (1007)");
    }

    #[tokio::test]
    async fn into_response_renders_code_message_details() {
        let (status, body) =
            response_parts(AppError::new(ErrorKind::Forbidden).append("admin required")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.code, 1009);
        assert_eq!(body.message, "forbidden");
        assert_eq!(body.details, vec!["admin required".to_string()]);
    }

    #[tokio::test]
    async fn empty_details_serialize_as_empty_list() {
        let response = AppError::new(ErrorKind::NotFound).into_response();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["details"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn server_errors_keep_details() {
        let (status, body) = response_parts(
            AppError::new(ErrorKind::RoleNotFound).append("default role user is missing"),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, 21001);
        assert_eq!(body.details, vec!["default role user is missing".to_string()]);
    }

    #[test]
    fn token_errors_map_to_invalid_or_generate_failed() {
        assert_eq!(AppError::from(TokenError::Expired).kind(), ErrorKind::TokenInvalid);
        assert_eq!(
            AppError::from(TokenError::Invalid("bad signature".into())).kind(),
            ErrorKind::TokenInvalid
        );
        assert_eq!(
            AppError::from(TokenError::Signing("key".into())).kind(),
            ErrorKind::TokenGenerateFailed
        );
    }

    #[test]
    fn collaborator_errors_are_server_errors() {
        let store = AppError::from(StoreError::Backend("connection reset".into()));
        assert_eq!(store.kind(), ErrorKind::DatabaseError);
        assert!(store.details()[0].contains("connection reset"));

        let cache = AppError::from(CacheError::Unavailable("refused".into()));
        assert_eq!(cache.kind(), ErrorKind::InternalServerError);
    }

    #[tokio::test]
    async fn success_envelope_shape() {
        let response = ApiResponse::ok(serde_json::json!({"token": "t"})).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["code"], 0);
        assert_eq!(json["message"], "success");
        assert_eq!(json["data"]["token"], "t");
    }
}
