//! `WebAuthn` verification core
//!
//! This module implements the server side of the W3C `WebAuthn` registration
//! and authentication ceremonies for ES256 / P-256 credentials, independent of
//! any transport or session handling. User state lives behind [`UserStore`]
//! and the cryptographic primitives behind [`CryptoBackend`].

pub mod assertion;
pub mod attestation;
pub mod authenticator_data;
pub mod base64url;
pub mod cbor;
pub mod challenge;
pub mod client_data;
pub mod cose;
pub mod crypto;
mod errors;
pub mod policy;
mod settings;
pub mod store;
mod types;

// Re-exports for public use
pub use assertion::AuthenticationVerifier;
pub use attestation::RegistrationVerifier;
pub use authenticator_data::AuthenticatorData;
pub use challenge::ChallengeLedger;
pub use cose::CoseKey;
pub use crypto::{CryptoBackend, RingBackend, RustCryptoBackend};
pub use errors::{CeremonyError, CeremonyResult};
pub use policy::{AcceptAnyRelyingParty, ConfiguredRelyingParty, RelyingPartyPolicy};
pub use settings::PasskeySettings;
pub use store::{MemoryUserStore, UserStore};
pub use types::*;
