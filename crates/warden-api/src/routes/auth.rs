//! # Login Routes
//!
//! Code-based login by mobile number or by email. Both verify the one-time
//! code, provision the principal on first login, and return a token for the
//! request's `Device-Type`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use warden_core::NaturalKey;

use crate::auth::device_class;
use crate::error::{ApiResponse, AppError};
use crate::extractors::{extract_validated_json, require_non_blank, Validate};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MobileLoginRequest {
    pub mobile: String,
    /// Dialling prefix, e.g. `+86`.
    pub country_code: String,
    /// One-time verification code.
    pub code: String,
}

impl Validate for MobileLoginRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("mobile", &self.mobile)?;
        require_non_blank("countryCode", &self.country_code)?;
        require_non_blank("code", &self.code)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmailLoginRequest {
    pub email: String,
    /// One-time verification code.
    pub code: String,
}

impl Validate for EmailLoginRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("email", &self.email)?;
        if !self.email.contains('@') {
            return Err("email must contain '@'".to_string());
        }
        require_non_blank("code", &self.code)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
}

/// Login routes, relative to the API prefix.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login/by-mobile-and-code", post(login_by_mobile))
        .route("/auth/login/by-email-and-code", post(login_by_email))
}

/// POST /auth/login/by-mobile-and-code
#[utoipa::path(
    post,
    path = "/auth/login/by-mobile-and-code",
    request_body = MobileLoginRequest,
    responses(
        (status = 200, description = "Logged in; `data.token` holds the bearer token"),
        (status = 400, description = "Malformed body or wrong code", body = crate::error::ErrorBody),
        (status = 429, description = "Login quota exhausted", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub async fn login_by_mobile(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<MobileLoginRequest>, JsonRejection>,
) -> Result<ApiResponse<LoginResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let key = NaturalKey::mobile(&req.mobile, &req.country_code);
    let outcome = state.login.login(key, &req.code, device_class(&headers)).await?;
    Ok(ApiResponse::ok(LoginResponse {
        token: outcome.token,
    }))
}

/// POST /auth/login/by-email-and-code
#[utoipa::path(
    post,
    path = "/auth/login/by-email-and-code",
    request_body = EmailLoginRequest,
    responses(
        (status = 200, description = "Logged in; `data.token` holds the bearer token"),
        (status = 400, description = "Malformed body or wrong code", body = crate::error::ErrorBody),
        (status = 429, description = "Login quota exhausted", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub async fn login_by_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<EmailLoginRequest>, JsonRejection>,
) -> Result<ApiResponse<LoginResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let key = NaturalKey::email(&req.email);
    let outcome = state.login.login(key, &req.code, device_class(&headers)).await?;
    Ok(ApiResponse::ok(LoginResponse {
        token: outcome.token,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use warden_core::ErrorKind;

    fn app() -> (Router, AppState) {
        let state = AppState::in_memory(AppConfig::default());
        (router().with_state(state.clone()), state)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn mobile_login_returns_verifiable_token() {
        let (app, state) = app();
        let response = app
            .oneshot(post_json(
                "/auth/login/by-mobile-and-code",
                serde_json::json!({"mobile": "13800000000", "countryCode": "+86", "code": "666666"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["code"], 0);
        let token = body["data"]["token"].as_str().unwrap();
        assert!(state.tokens.verify(token).is_ok());
    }

    #[tokio::test]
    async fn email_login_with_wrong_code_is_rejected() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json(
                "/auth/login/by-email-and-code",
                serde_json::json!({"email": "a@example.com", "code": "000000"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["code"], ErrorKind::EmailVerificationCodeIncorrect.code());
    }

    #[tokio::test]
    async fn blank_field_is_invalid_param() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json(
                "/auth/login/by-mobile-and-code",
                serde_json::json!({"mobile": " ", "countryCode": "+86", "code": "666666"}),
            ))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["code"], ErrorKind::InvalidParam.code());
        assert_eq!(body["details"][0], "mobile must not be empty");
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/login/by-email-and-code")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["code"], ErrorKind::BadRequest.code());
    }
}
