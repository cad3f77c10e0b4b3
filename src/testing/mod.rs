//! Testing utilities
//!
//! Shared by the unit tests and the integration tests under `tests/`.
//!
//! - [`fixtures`] - Pre-wired services, stores and policies
//! - [`builders`] - Byte-level builders for client data, authenticator data
//!   and attestation objects
//! - [`mock`] - A software authenticator backed by a real P-256 key
//!
//! ## Usage
//!
//! ```rust
//! use passkey_verify::testing::{constants::*, SoftAuthenticator, TestFixtures};
//!
//! let service = TestFixtures::service();
//! let authenticator = SoftAuthenticator::new(TEST_RP_ID, TEST_ORIGIN).unwrap();
//!
//! let options = service.start_registration(TEST_EMAIL).unwrap();
//! let response = authenticator.register(&options.challenge).unwrap();
//! assert!(service.finish_registration(TEST_EMAIL, &response).is_ok());
//! ```

pub mod builders;
pub mod fixtures;
pub mod mock;

// Re-export commonly used items for convenience
pub use builders::AuthenticatorDataBuilder;
pub use fixtures::TestFixtures;
pub use mock::SoftAuthenticator;

/// Common test constants
pub mod constants {
    /// Default test account
    pub const TEST_EMAIL: &str = "alice@example.com";

    /// Relying party ID the fixtures are configured for
    pub const TEST_RP_ID: &str = "localhost";

    /// Origin the fixtures accept
    pub const TEST_ORIGIN: &str = "https://localhost";
}
