//! Relying party checks
//!
//! Origin and RP ID hash validation sit behind [`RelyingPartyPolicy`] so that
//! deployments can tighten or relax them without touching the verifiers.

use log::debug;

use super::crypto::CryptoBackend;
use super::errors::CeremonyError;

/// Checks binding a ceremony to this relying party
pub trait RelyingPartyPolicy: Send + Sync {
    /// Accept or reject `clientData.origin`
    ///
    /// # Errors
    /// Returns `OriginMismatch` when the origin is not allowed.
    fn check_origin(&self, origin: &str) -> Result<(), CeremonyError>;

    /// Accept or reject the `rpIdHash` from the authenticator data
    ///
    /// # Errors
    /// Returns `RelyingPartyMismatch` when the hash does not match.
    fn check_rp_id_hash(&self, rp_id_hash: &[u8; 32]) -> Result<(), CeremonyError>;
}

/// Policy built from the configured RP ID and allowed origins
#[derive(Debug, Clone)]
pub struct ConfiguredRelyingParty {
    rp_id: String,
    rp_id_hash: [u8; 32],
    origins: Vec<String>,
}

impl ConfiguredRelyingParty {
    /// Build the policy, hashing the RP ID once up front
    #[must_use]
    pub fn new(rp_id: &str, origins: Vec<String>, crypto: &dyn CryptoBackend) -> Self {
        let origins = origins
            .into_iter()
            .map(|o| o.trim_end_matches('/').to_string())
            .collect();
        Self {
            rp_id: rp_id.to_string(),
            rp_id_hash: crypto.sha256(rp_id.as_bytes()),
            origins,
        }
    }

    #[must_use]
    pub fn rp_id(&self) -> &str {
        &self.rp_id
    }

    #[must_use]
    pub fn origins(&self) -> &[String] {
        &self.origins
    }
}

impl RelyingPartyPolicy for ConfiguredRelyingParty {
    fn check_origin(&self, origin: &str) -> Result<(), CeremonyError> {
        if self.origins.iter().any(|allowed| allowed == origin) {
            Ok(())
        } else {
            debug!("Origin {origin} not in allowed list {:?}", self.origins);
            Err(CeremonyError::OriginMismatch)
        }
    }

    fn check_rp_id_hash(&self, rp_id_hash: &[u8; 32]) -> Result<(), CeremonyError> {
        if *rp_id_hash == self.rp_id_hash {
            Ok(())
        } else {
            debug!("rpIdHash does not match RP ID {}", self.rp_id);
            Err(CeremonyError::RelyingPartyMismatch)
        }
    }
}

/// Policy that accepts every origin and RP ID hash
///
/// Only meant for test rigs that replay fixtures captured elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAnyRelyingParty;

impl RelyingPartyPolicy for AcceptAnyRelyingParty {
    fn check_origin(&self, _origin: &str) -> Result<(), CeremonyError> {
        Ok(())
    }

    fn check_rp_id_hash(&self, _rp_id_hash: &[u8; 32]) -> Result<(), CeremonyError> {
        Ok(())
    }
}
