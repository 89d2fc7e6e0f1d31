//! # Identity Tokens
//!
//! HS256-signed bearer tokens carrying a principal's unique code.
//!
//! ## Claims
//!
//! ```text
//! { "sub": uniCode, "iss": issuer, "iat": now, "nbf": now, "exp": now + lifetime }
//! ```
//!
//! Tokens are stateless: there is no revocation list, so a token is valid
//! exactly when its signature checks out and `nbf <= now < exp` on the
//! service's [`Clock`]. Timestamp checks are done here rather than by the
//! JWT library so that they follow the injected clock.
//!
//! ## Sliding renewal
//!
//! When a verified token has less than a third of its device-class lifetime
//! left, [`TokenService::needs_renewal`] says so and the caller issues a fresh
//! token alongside the response. The old token stays valid until its own
//! expiry.

use std::sync::Arc;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::{DeviceClass, TokenLifetimes};
use crate::identity::UniCode;
use crate::temporal::Clock;

/// Signed claims of an identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the principal's unique code.
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl Claims {
    pub fn subject(&self) -> UniCode {
        UniCode::new(self.sub.clone())
    }
}

/// Token failures. All of them surface as `TokenInvalid` at the HTTP boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Not a well-formed token, wrong algorithm, or bad signature.
    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Symmetric signing secret.
///
/// Custom `Debug` redacts the value to prevent credential leakage in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);

impl TokenSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenSecret([REDACTED])")
    }
}

/// Issues, verifies, and renews identity tokens.
pub struct TokenService {
    issuer: String,
    lifetimes: TokenLifetimes,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("lifetimes", &self.lifetimes)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(
        issuer: impl Into<String>,
        secret: &TokenSecret,
        lifetimes: TokenLifetimes,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let issuer = issuer.into();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "iss", "iat", "nbf", "exp"]);
        validation.set_issuer(&[issuer.as_str()]);

        Self {
            issuer,
            lifetimes,
            encoding: EncodingKey::from_secret(secret.expose().as_bytes()),
            decoding: DecodingKey::from_secret(secret.expose().as_bytes()),
            validation,
            clock,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn lifetimes(&self) -> &TokenLifetimes {
        &self.lifetimes
    }

    /// Issue a token for `subject` with the lifetime of `device`.
    pub fn issue(&self, subject: &UniCode, device: DeviceClass) -> Result<String, TokenError> {
        let now = self.clock.now().timestamp();
        let lifetime = self.lifetime_secs(device);
        let claims = Claims {
            sub: subject.as_str().to_string(),
            iss: self.issuer.clone(),
            iat: now,
            nbf: now,
            exp: now.saturating_add(lifetime),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Check signature, issuer, and validity window; return the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;
        let claims = data.claims;

        let now = self.clock.now().timestamp();
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        if now < claims.nbf {
            return Err(TokenError::NotYetValid);
        }
        Ok(claims)
    }

    /// Whether a verified token should be renewed: `0 < remaining < lifetime / 3`.
    pub fn needs_renewal(&self, claims: &Claims, device: DeviceClass) -> bool {
        let remaining = claims.exp.saturating_sub(self.clock.now().timestamp());
        let lifetime = self.lifetime_secs(device);
        remaining > 0 && remaining.saturating_mul(3) < lifetime
    }

    /// Issue a replacement token when [`needs_renewal`](Self::needs_renewal) holds.
    pub fn renew(&self, claims: &Claims, device: DeviceClass) -> Result<Option<String>, TokenError> {
        if !self.needs_renewal(claims, device) {
            return Ok(None);
        }
        self.issue(&claims.subject(), device).map(Some)
    }

    fn lifetime_secs(&self, device: DeviceClass) -> i64 {
        i64::try_from(self.lifetimes.get(device).as_secs()).unwrap_or(i64::MAX)
    }
}
