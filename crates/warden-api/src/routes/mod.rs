//! # Route Modules
//!
//! Each module defines an Axum Router for one API surface area, with paths
//! relative to the configured API prefix. [`crate::app`] mounts them.

pub mod auth;
pub mod user;
