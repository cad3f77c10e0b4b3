#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the passkey-verify crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod passkey;
pub mod settings;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod webauthn;

/// Re-export commonly used items
pub use passkey::PasskeyService;
pub use settings::ServerSettings;
pub use webauthn::{
    AuthenticationVerifier, CeremonyError, CryptoBackend, MemoryUserStore, PasskeySettings,
    RegistrationVerifier, RingBackend, RustCryptoBackend, UserStore,
};
