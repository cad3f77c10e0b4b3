//! Client data handling
//!
//! `clientDataJSON` is signed by the authenticator together with the
//! authenticator data, so the verifiers keep the exact decoded bytes around
//! for hashing and only use the parsed form for the type/challenge/origin
//! checks.

use serde::Deserialize;

use super::base64url;
use super::errors::CeremonyError;
use super::types::CeremonyKind;

/// Parsed `clientDataJSON`
#[derive(Debug, Clone, Deserialize)]
pub struct ClientData {
    #[serde(rename = "type")]
    pub r#type: String,
    pub challenge: String,
    pub origin: String,
    #[serde(rename = "crossOrigin", default)]
    pub cross_origin: Option<bool>,
}

/// Decoded client data: raw bytes plus the parsed view
#[derive(Debug, Clone)]
pub struct CollectedClientData {
    pub raw: Vec<u8>,
    pub parsed: ClientData,
}

impl CollectedClientData {
    /// Decode base64url `clientDataJSON` and parse it
    ///
    /// # Errors
    /// Returns `MalformedInput` if the text is not base64url or the bytes are
    /// not a JSON object with `type`, `challenge` and `origin`.
    pub fn decode(client_data_json_b64: &str) -> Result<Self, CeremonyError> {
        let raw = base64url::decode_field("clientDataJSON", client_data_json_b64)?;
        let parsed: ClientData = serde_json::from_slice(&raw)
            .map_err(|e| CeremonyError::MalformedInput(format!("invalid client data JSON: {e}")))?;
        Ok(Self { raw, parsed })
    }

    /// Require the client data to belong to the given ceremony
    ///
    /// # Errors
    /// Returns `InvalidCeremonyType` on mismatch.
    pub fn expect_kind(&self, kind: CeremonyKind) -> Result<(), CeremonyError> {
        if self.parsed.r#type == kind.client_data_type() {
            Ok(())
        } else {
            Err(CeremonyError::InvalidCeremonyType)
        }
    }

    /// Compare the echoed challenge with the issued one
    ///
    /// # Errors
    /// Returns `ChallengeMismatch` if they differ.
    pub fn expect_challenge(&self, issued: &[u8]) -> Result<(), CeremonyError> {
        // Compare decoded bytes so padding differences don't matter
        let echoed = base64url::decode(&self.parsed.challenge)
            .map_err(|_| CeremonyError::ChallengeMismatch)?;
        if echoed == issued {
            Ok(())
        } else {
            Err(CeremonyError::ChallengeMismatch)
        }
    }
}
