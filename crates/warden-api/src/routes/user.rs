//! # Principal Routes
//!
//! Authenticated routes about the calling principal. Mounted behind the auth
//! middleware; the admin ping additionally sits behind a role gate.

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use warden_core::{ErrorKind, RoleCode};

use crate::access::{role_gate_middleware, RoleGate};
use crate::auth::CallerIdentity;
use crate::error::{ApiResponse, AppError};
use crate::state::AppState;

/// Roles admitted to the admin ping.
pub const ADMIN_ROLES: [RoleCode; 2] = [RoleCode::Admin, RoleCode::SuperAdmin];

/// The calling principal's profile.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub uni_code: String,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub country_code: Option<String>,
    pub nickname: String,
    /// Enabled role codes, e.g. `user`, `admin`.
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminPing {
    pub pong: bool,
}

/// Principal routes, relative to the API prefix.
pub fn router(state: &AppState) -> Router<AppState> {
    let admin_gate = (state.access.clone(), RoleGate::any(&ADMIN_ROLES));
    let admin = Router::new()
        .route("/user/admin/ping", get(admin_ping))
        .route_layer(axum::middleware::from_fn_with_state(
            admin_gate,
            role_gate_middleware,
        ));

    Router::new().route("/user/info", get(info)).merge(admin)
}

/// GET /user/info
#[utoipa::path(
    get,
    path = "/user/info",
    responses(
        (status = 200, description = "Profile of the caller in `data`"),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorBody),
        (status = 404, description = "Principal no longer exists", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "user"
)]
pub async fn info(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<ApiResponse<UserInfo>, AppError> {
    let principal = state
        .principals
        .find_by_code(&caller.uni_code)
        .await?
        .ok_or_else(|| {
            AppError::new(ErrorKind::PrincipalNotFound).append(caller.uni_code.to_string())
        })?;
    let roles = state.roles.get_roles(&caller.uni_code).await?;

    Ok(ApiResponse::ok(UserInfo {
        uni_code: principal.uni_code.to_string(),
        email: principal.email,
        mobile: principal.mobile,
        country_code: principal.country_code,
        nickname: principal.nickname,
        roles: roles.iter().map(|r| r.as_str().to_string()).collect(),
    }))
}

/// GET /user/admin/ping
#[utoipa::path(
    get,
    path = "/user/admin/ping",
    responses(
        (status = 200, description = "Caller holds admin or super_admin"),
        (status = 403, description = "Caller lacks an admin role", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "user"
)]
pub async fn admin_ping(caller: CallerIdentity) -> ApiResponse<AdminPing> {
    tracing::debug!(uni_code = %caller.uni_code, "admin ping");
    ApiResponse::ok(AdminPing { pong: true })
}
