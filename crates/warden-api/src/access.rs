//! # Access Control
//!
//! Role-based authorization for authenticated routes. Evaluation order is
//! fixed: the caller must be bound by [`auth_middleware`](crate::auth::auth_middleware)
//! (else 401), its enabled roles are read through the [`RoleCache`] (a
//! backend failure is 500), and the [`RoleGate`] policy is applied (else 403).

use std::collections::BTreeSet;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use warden_core::{role_check, ErrorKind, RoleCheckMode, RoleCode};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::role_cache::RoleCache;

/// Role requirement of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGate {
    pub mode: RoleCheckMode,
    pub required: Vec<RoleCode>,
}

impl RoleGate {
    /// Caller must hold at least one of `roles`.
    pub fn any(roles: &[RoleCode]) -> Self {
        Self {
            mode: RoleCheckMode::Any,
            required: roles.to_vec(),
        }
    }

    /// Caller must hold every one of `roles`.
    pub fn all(roles: &[RoleCode]) -> Self {
        Self {
            mode: RoleCheckMode::All,
            required: roles.to_vec(),
        }
    }

    fn describe(&self) -> String {
        let roles: Vec<&str> = self.required.iter().map(RoleCode::as_str).collect();
        let mode = match self.mode {
            RoleCheckMode::Any => "any of",
            RoleCheckMode::All => "all of",
        };
        format!("requires {mode} [{}]", roles.join(", "))
    }
}

#[derive(Debug, Clone)]
pub struct AccessControl {
    roles: RoleCache,
}

impl AccessControl {
    pub fn new(roles: RoleCache) -> Self {
        Self { roles }
    }

    /// Decide whether `caller` passes `gate`, returning the roles consulted.
    pub async fn authorize(
        &self,
        caller: Option<&CallerIdentity>,
        gate: &RoleGate,
    ) -> Result<BTreeSet<RoleCode>, AppError> {
        let caller = caller.ok_or_else(|| {
            AppError::new(ErrorKind::Unauthorized).append("no caller identity in request context")
        })?;

        let roles = self.roles.get_roles(&caller.uni_code).await?;

        if role_check(gate.mode, &gate.required, &roles) {
            Ok(roles)
        } else {
            tracing::warn!(uni_code = %caller.uni_code, gate = %gate.describe(), "access denied");
            Err(AppError::new(ErrorKind::Forbidden).append(gate.describe()))
        }
    }
}

/// Middleware enforcing a [`RoleGate`]. Must run inside the auth middleware.
pub async fn role_gate_middleware(
    State((access, gate)): State<(AccessControl, RoleGate)>,
    request: Request,
    next: Next,
) -> Response {
    let caller = request.extensions().get::<CallerIdentity>().cloned();
    let decision = access.authorize(caller.as_ref(), &gate).await;
    match decision {
        Ok(_) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FailingCache;
    use std::sync::Arc;
    use warden_core::{Claims, DeviceClass, NaturalKey, UniCode};
    use warden_store::{MemoryCache, MemoryPrincipalStore};

    fn caller(code: &str) -> CallerIdentity {
        CallerIdentity {
            uni_code: UniCode::new(code),
            device: DeviceClass::Web,
            claims: Claims {
                sub: code.to_string(),
                iss: "warden".into(),
                iat: 0,
                nbf: 0,
                exp: i64::MAX,
            },
        }
    }

    fn access_with(roles: &[RoleCode]) -> AccessControl {
        let store = MemoryPrincipalStore::with_roles(&RoleCode::ALL);
        store
            .insert_principal(
                UniCode::new("AAAA-AAAA-AAAA-AAAA"),
                &NaturalKey::email("a@example.com"),
                roles,
            )
            .unwrap();
        AccessControl::new(RoleCache::new(
            Arc::new(store),
            Arc::new(MemoryCache::default()),
        ))
    }

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let access = access_with(&[RoleCode::Admin]);
        let err = access
            .authorize(None, &RoleGate::any(&[RoleCode::Admin]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn any_gate_passes_with_one_role() {
        let access = access_with(&[RoleCode::Admin]);
        let gate = RoleGate::any(&[RoleCode::Admin, RoleCode::SuperAdmin]);
        let roles = access
            .authorize(Some(&caller("AAAA-AAAA-AAAA-AAAA")), &gate)
            .await
            .unwrap();
        assert!(roles.contains(&RoleCode::Admin));
    }

    #[tokio::test]
    async fn all_gate_needs_every_role() {
        let access = access_with(&[RoleCode::Admin]);
        let gate = RoleGate::all(&[RoleCode::Admin, RoleCode::SuperAdmin]);
        let err = access
            .authorize(Some(&caller("AAAA-AAAA-AAAA-AAAA")), &gate)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(err.details(), ["requires all of [admin, super_admin]"]);
    }

    #[tokio::test]
    async fn unknown_principal_is_forbidden() {
        let access = access_with(&[]);
        let err = access
            .authorize(Some(&caller("ZZZZ-ZZZZ-ZZZZ-ZZZZ")), &RoleGate::any(&[RoleCode::User]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn empty_gate_admits_any_caller() {
        let access = access_with(&[]);
        assert!(access
            .authorize(Some(&caller("AAAA-AAAA-AAAA-AAAA")), &RoleGate::any(&[]))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn role_cache_failure_is_internal_error() {
        let store = MemoryPrincipalStore::with_roles(&RoleCode::ALL);
        let access = AccessControl::new(RoleCache::new(Arc::new(store), Arc::new(FailingCache)));
        let err = access
            .authorize(Some(&caller("AAAA-AAAA-AAAA-AAAA")), &RoleGate::any(&[RoleCode::User]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalServerError);
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
