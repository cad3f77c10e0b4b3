//! Passkey functionality for application integration
//!
//! This module ties the `WebAuthn` verification core to user accounts and,
//! with the `server` feature, exposes it over HTTP.

// Service layer
mod service;
pub use service::*;

// HTTP endpoints
#[cfg(feature = "server")]
pub mod handlers;
