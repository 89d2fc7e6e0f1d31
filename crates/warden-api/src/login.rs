//! # Login and First-Login Provisioning
//!
//! A login presents a natural key (email, or mobile with country code) and a
//! one-time code. The flow:
//!
//! 1. Check the one-time code. A mismatch ends the login; nothing is written.
//! 2. Look the principal up by its normalized natural key.
//! 3. If absent, provision it in one store transaction: draw unique codes
//!    until one is unused, fetch the default role, insert the principal
//!    bound to that role, commit. Any failure rolls the transaction back.
//! 4. Issue a token for the principal's unique code.
//!
//! Two first logins for the same key can race. The store's uniqueness
//! constraint on natural keys lets exactly one commit; the loser sees a
//! conflict, re-reads, and returns the winner's principal.

use std::sync::Arc;

use warden_core::{
    CodeSource, DeviceClass, ErrorKind, NaturalKey, NewPrincipal, Principal, RoleCode,
    TokenService, UniCode,
};
use warden_store::{PrincipalStore, ProvisioningTx, StoreError};

use crate::error::AppError;

/// Lookup/provision rounds before a persistent conflict is reported.
pub const MAX_PROVISION_ATTEMPTS: usize = 3;

/// Role bound to newly provisioned principals.
pub const DEFAULT_ROLE: RoleCode = RoleCode::User;

/// Decides whether a one-time code is valid for a natural key.
pub trait CodeVerifier: Send + Sync {
    fn verify(&self, key: &NaturalKey, code: &str) -> bool;
}

/// Accepts a single configured code for every key.
#[derive(Debug, Clone)]
pub struct FixedCodeVerifier {
    expected: String,
}

impl FixedCodeVerifier {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

/// Codes must match byte for byte; surrounding whitespace is a mismatch.
impl CodeVerifier for FixedCodeVerifier {
    fn verify(&self, _key: &NaturalKey, code: &str) -> bool {
        code == self.expected
    }
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub principal: Principal,
    /// Whether this login provisioned the principal.
    pub provisioned: bool,
}

pub struct LoginOrchestrator {
    store: Arc<dyn PrincipalStore>,
    tokens: Arc<TokenService>,
    codes: Arc<dyn CodeSource>,
    verifier: Arc<dyn CodeVerifier>,
    default_role: RoleCode,
}

impl std::fmt::Debug for LoginOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginOrchestrator")
            .field("default_role", &self.default_role)
            .finish_non_exhaustive()
    }
}

/// Draw candidates from `codes` until one is unused in the store.
///
/// Unbounded; the code space is 36^16.
pub async fn generate_unique_code(
    codes: &dyn CodeSource,
    tx: &mut dyn ProvisioningTx,
) -> Result<UniCode, StoreError> {
    loop {
        let candidate = codes.next_code();
        if !tx.code_exists(&candidate).await? {
            return Ok(candidate);
        }
        tracing::debug!(code = %candidate, "unique code collision, redrawing");
    }
}

impl LoginOrchestrator {
    pub fn new(
        store: Arc<dyn PrincipalStore>,
        tokens: Arc<TokenService>,
        codes: Arc<dyn CodeSource>,
        verifier: Arc<dyn CodeVerifier>,
    ) -> Self {
        Self {
            store,
            tokens,
            codes,
            verifier,
            default_role: DEFAULT_ROLE,
        }
    }

    pub fn with_default_role(mut self, role: RoleCode) -> Self {
        self.default_role = role;
        self
    }

    /// Verify `code` for `key`, resolve or provision the principal, and
    /// issue a token for `device`.
    pub async fn login(
        &self,
        key: NaturalKey,
        code: &str,
        device: DeviceClass,
    ) -> Result<LoginOutcome, AppError> {
        if !self.verifier.verify(&key, code) {
            let kind = match key {
                NaturalKey::Email(_) => ErrorKind::EmailVerificationCodeIncorrect,
                NaturalKey::Mobile { .. } => ErrorKind::MobileVerificationCodeIncorrect,
            };
            return Err(AppError::new(kind));
        }

        let (principal, provisioned) = self.resolve(&key).await?;
        let token = self.tokens.issue(&principal.uni_code, device)?;

        tracing::info!(
            uni_code = %principal.uni_code,
            device = device.as_str(),
            provisioned,
            "login succeeded"
        );
        Ok(LoginOutcome {
            token,
            principal,
            provisioned,
        })
    }

    async fn resolve(&self, key: &NaturalKey) -> Result<(Principal, bool), AppError> {
        for attempt in 1..=MAX_PROVISION_ATTEMPTS {
            if let Some(existing) = self.store.find_by_natural_key(key).await? {
                return Ok((existing, false));
            }
            match self.provision(key).await? {
                Some(created) => return Ok((created, true)),
                None => {
                    tracing::warn!(attempt, key = key.display_name(), "provisioning conflict, re-reading");
                }
            }
        }

        match self.store.find_by_natural_key(key).await? {
            Some(existing) => Ok((existing, false)),
            None => Err(AppError::new(ErrorKind::InternalServerError)
                .append("principal provisioning kept conflicting")),
        }
    }

    /// Provision a principal for `key`. `Ok(None)` means a uniqueness
    /// conflict rolled the transaction back.
    async fn provision(&self, key: &NaturalKey) -> Result<Option<Principal>, AppError> {
        let mut tx = self.store.begin().await?;

        let uni_code = generate_unique_code(self.codes.as_ref(), tx.as_mut()).await?;

        let role = tx.find_role(self.default_role).await?.ok_or_else(|| {
            AppError::new(ErrorKind::RoleNotFound)
                .append(format!("default role {} is missing", self.default_role))
        })?;

        let new = NewPrincipal::for_key(uni_code, key.clone(), role);
        let created = match tx.create_principal(&new).await {
            Ok(created) => created,
            Err(StoreError::Conflict(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match tx.commit().await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(uni_code = %created.uni_code, role = %self.default_role, "provisioned principal");
        Ok(Some(created))
    }
}
