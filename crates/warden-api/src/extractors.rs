//! # Custom Extractors & Validation
//!
//! Provides the [`Validate`] trait for request DTOs and helpers to extract
//! and validate JSON bodies in handlers.

use axum::extract::rejection::JsonRejection;
use axum::Json;
use warden_core::ErrorKind;

use crate::error::AppError;

/// Business rules a request body must satisfy beyond deserialization.
pub trait Validate {
    /// Returns a message naming the offending field on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping rejections to `BadRequest`.
///
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
///     let req = extract_json(body)?;
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::new(ErrorKind::BadRequest).append(err.body_text()))
}

/// Extract a JSON body and run its [`Validate`] rules, mapping rule
/// failures to `InvalidParam`.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value
        .validate()
        .map_err(|msg| AppError::new(ErrorKind::InvalidParam).append(msg))?;
    Ok(value)
}

/// `Err` naming `field` when `value` is blank.
pub fn require_non_blank(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} must not be empty"))
    } else {
        Ok(())
    }
}
