//! # OpenAPI Specification Assembly
//!
//! Assembles the utoipa-documented routes into one OpenAPI document served
//! at `/openapi.json`. Paths are relative to the API prefix, which is
//! declared as the document's server.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Warden API",
        version = "0.1.0",
        description = "Token authentication, role-based access control, rate limiting and code-based login."
    ),
    servers((url = "/api/v1", description = "Default API prefix")),
    paths(
        crate::routes::auth::login_by_mobile,
        crate::routes::auth::login_by_email,
        crate::routes::user::info,
        crate::routes::user::admin_ping,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::routes::auth::MobileLoginRequest,
        crate::routes::auth::EmailLoginRequest,
        crate::routes::auth::LoginResponse,
        crate::routes::user::UserInfo,
        crate::routes::user::AdminPing,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Code-based login"),
        (name = "user", description = "Calling principal"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
