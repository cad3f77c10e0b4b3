//! Test fixtures providing pre-built test objects
//!
//! Services, stores and policies wired the same way the server wires them,
//! pointed at the `localhost` relying party.

use std::sync::Arc;

use crate::passkey::PasskeyService;
use crate::webauthn::{
    ChallengeLedger, ConfiguredRelyingParty, CryptoBackend, MemoryUserStore, PasskeySettings,
    RelyingPartyPolicy, RingBackend, User, UserStore,
};

use super::constants::{TEST_ORIGIN, TEST_RP_ID};

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Settings for the `localhost` relying party
    #[must_use]
    pub fn settings() -> PasskeySettings {
        PasskeySettings {
            rp_id: TEST_RP_ID.to_string(),
            rp_origins: vec![TEST_ORIGIN.to_string()],
            ..PasskeySettings::default()
        }
    }

    /// Default crypto backend
    #[must_use]
    pub fn crypto() -> Arc<dyn CryptoBackend> {
        Arc::new(RingBackend::new())
    }

    /// Policy matching [`TestFixtures::settings`]
    #[must_use]
    pub fn policy(crypto: &dyn CryptoBackend) -> Arc<dyn RelyingPartyPolicy> {
        Arc::new(ConfiguredRelyingParty::new(
            TEST_RP_ID,
            vec![TEST_ORIGIN.to_string()],
            crypto,
        ))
    }

    /// Ledger using the default challenge TTL
    #[must_use]
    pub fn ledger(store: Arc<dyn UserStore>, crypto: Arc<dyn CryptoBackend>) -> ChallengeLedger {
        ChallengeLedger::new(store, crypto, Self::settings().challenge_ttl())
    }

    /// Memory store holding one user without credentials
    ///
    /// # Panics
    /// Panics if the store rejects the insert.
    #[must_use]
    pub fn store_with_user(email: &str) -> (Arc<MemoryUserStore>, Arc<dyn CryptoBackend>) {
        let store = Arc::new(MemoryUserStore::new());
        let result = store.put(email, User::new(vec![0x42; 32], email));
        assert!(result.is_ok(), "memory store rejected insert: {result:?}");
        (store, Self::crypto())
    }

    /// Service over an empty memory store
    #[must_use]
    pub fn service() -> PasskeyService {
        Self::service_with(Self::settings(), Self::crypto())
    }

    /// Service with custom settings and backend
    #[must_use]
    pub fn service_with(settings: PasskeySettings, crypto: Arc<dyn CryptoBackend>) -> PasskeyService {
        PasskeyService::new(settings, Arc::new(MemoryUserStore::new()), crypto)
    }
}
