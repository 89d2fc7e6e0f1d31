//! # Error-Kind Registry
//!
//! Every error Warden can surface to a client is one [`ErrorKind`]. The
//! numeric code, HTTP status, and default message of each kind are assigned
//! once, in the `match` arms below. Codes are grouped by scope:
//!
//! | Range   | Scope     |
//! |---------|-----------|
//! | 1000+   | common    |
//! | 20000+  | principal |
//! | 21000+  | role      |
//!
//! Uniqueness of codes is checked by the test suite rather than at runtime.

use serde::{Deserialize, Serialize};

/// A tagged error kind with a stable numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    // -- common --
    InternalServerError,
    NotFound,
    BadRequest,
    InvalidParam,
    Unauthorized,
    TokenInvalid,
    TokenNotFound,
    TokenGenerateFailed,
    Forbidden,
    TooManyRequests,
    ServiceUnavailable,
    DatabaseError,

    // -- principal --
    MobileVerificationCodeIncorrect,
    EmailVerificationCodeIncorrect,
    PrincipalNotFound,

    // -- role --
    RoleNotFound,
}

impl ErrorKind {
    /// Every registered kind, in code order.
    pub const ALL: [ErrorKind; 16] = [
        Self::InternalServerError,
        Self::NotFound,
        Self::BadRequest,
        Self::InvalidParam,
        Self::Unauthorized,
        Self::TokenInvalid,
        Self::TokenNotFound,
        Self::TokenGenerateFailed,
        Self::Forbidden,
        Self::TooManyRequests,
        Self::ServiceUnavailable,
        Self::DatabaseError,
        Self::MobileVerificationCodeIncorrect,
        Self::EmailVerificationCodeIncorrect,
        Self::PrincipalNotFound,
        Self::RoleNotFound,
    ];

    /// Numeric code carried in the `code` field of error bodies.
    pub const fn code(&self) -> u32 {
        match self {
            Self::InternalServerError => 1001,
            Self::NotFound => 1002,
            Self::BadRequest => 1003,
            Self::InvalidParam => 1004,
            Self::Unauthorized => 1005,
            Self::TokenInvalid => 1006,
            Self::TokenNotFound => 1007,
            Self::TokenGenerateFailed => 1008,
            Self::Forbidden => 1009,
            Self::TooManyRequests => 1010,
            Self::ServiceUnavailable => 1011,
            Self::DatabaseError => 1012,
            Self::MobileVerificationCodeIncorrect => 20001,
            Self::EmailVerificationCodeIncorrect => 20002,
            Self::PrincipalNotFound => 20003,
            Self::RoleNotFound => 21001,
        }
    }

    /// HTTP status code for this kind.
    pub const fn status(&self) -> u16 {
        match self {
            Self::InternalServerError
            | Self::DatabaseError
            | Self::TokenGenerateFailed
            | Self::RoleNotFound => 500,
            Self::NotFound | Self::PrincipalNotFound => 404,
            Self::BadRequest
            | Self::InvalidParam
            | Self::MobileVerificationCodeIncorrect
            | Self::EmailVerificationCodeIncorrect => 400,
            Self::Unauthorized | Self::TokenInvalid | Self::TokenNotFound => 401,
            Self::Forbidden => 403,
            Self::TooManyRequests => 429,
            Self::ServiceUnavailable => 503,
        }
    }

    /// Default human-readable message.
    pub const fn message(&self) -> &'static str {
        match self {
            Self::InternalServerError => "internal server error",
            Self::NotFound => "not found",
            Self::BadRequest => "bad request",
            Self::InvalidParam => "invalid param",
            Self::Unauthorized => "unauthorized",
            Self::TokenInvalid => "token invalid",
            Self::TokenNotFound => "token not found",
            Self::TokenGenerateFailed => "token generate failed",
            Self::Forbidden => "forbidden",
            Self::TooManyRequests => "too many requests",
            Self::ServiceUnavailable => "service unavailable",
            Self::DatabaseError => "database error",
            Self::MobileVerificationCodeIncorrect => "the mobile verification code is incorrect",
            Self::EmailVerificationCodeIncorrect => "the email verification code is incorrect",
            Self::PrincipalNotFound => "principal not found",
            Self::RoleNotFound => "role not found",
        }
    }

    /// Whether this kind is a server-side failure (5xx).
    pub const fn is_server_error(&self) -> bool {
        self.status() >= 500
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}
