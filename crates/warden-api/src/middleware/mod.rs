//! # Middleware Modules
//!
//! Tower middleware for the API service. Authentication and role gates live
//! in [`crate::auth`] and [`crate::access`].

pub mod rate_limit;
pub mod tracing_layer;
