//! API middleware.
//!
//! A single auth layer wraps every protected route: bearer token →
//! session lookup → `AuthContext` in request extensions.

pub mod auth;
