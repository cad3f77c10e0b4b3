//! Challenge issuance and consumption
//!
//! A user has at most one challenge in flight. Issuing replaces whatever was
//! pending; consuming is the store's atomic check-and-clear, so two racing
//! verification attempts can never both observe the same challenge.

use std::sync::Arc;

use chrono::{Duration, Utc};
use log::debug;

use super::crypto::CryptoBackend;
use super::errors::CeremonyError;
use super::store::UserStore;
use super::types::{CeremonyKind, PendingChallenge};

/// Challenge size in bytes (256 bits)
pub const CHALLENGE_LEN: usize = 32;

/// Issues and consumes single-use challenges through the user store
#[derive(Clone)]
pub struct ChallengeLedger {
    store: Arc<dyn UserStore>,
    crypto: Arc<dyn CryptoBackend>,
    ttl: Duration,
}

impl ChallengeLedger {
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>, crypto: Arc<dyn CryptoBackend>, ttl: Duration) -> Self {
        Self { store, crypto, ttl }
    }

    /// Generate a fresh challenge for `account` and make it the pending one
    ///
    /// # Errors
    /// Returns `Crypto` if randomness fails, `UnknownUser` if the account does
    /// not exist, or `Store` on backend failure.
    pub fn issue(
        &self,
        account: &str,
        kind: CeremonyKind,
    ) -> Result<PendingChallenge, CeremonyError> {
        let challenge = PendingChallenge {
            value: self.crypto.random_bytes(CHALLENGE_LEN)?,
            kind,
            issued_at: Utc::now(),
        };
        self.store.set_challenge(account, challenge.clone())?;
        debug!("Issued {kind} challenge for {account}");
        Ok(challenge)
    }

    /// Take the pending challenge of `kind` for `account`
    ///
    /// The challenge is gone after this call whether or not the caller's
    /// comparison succeeds.
    ///
    /// # Errors
    /// - `ChallengeMismatch` if nothing of that kind is pending
    /// - `ChallengeExpired` if it was issued more than the TTL ago
    /// - `Store` on backend failure
    pub fn consume(
        &self,
        account: &str,
        kind: CeremonyKind,
    ) -> Result<PendingChallenge, CeremonyError> {
        let challenge = self
            .store
            .take_challenge(account, kind)?
            .ok_or(CeremonyError::ChallengeMismatch)?;

        if Utc::now() - challenge.issued_at > self.ttl {
            debug!("Expired {kind} challenge consumed for {account}");
            return Err(CeremonyError::ChallengeExpired);
        }
        Ok(challenge)
    }
}
