//! API endpoint handlers, one module per resource.
//!
//! Handlers follow the same shape throughout: authorize the caller,
//! delegate to the domain service, wrap the typed result in the envelope.

pub mod appointments;
pub mod auth;
pub mod chatbot;
pub mod health;
pub mod manager;
pub mod medical_records;
pub mod payments;
pub mod reports;
pub mod users;
