//! Authentication (assertion) verification

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};

use super::authenticator_data::AuthenticatorData;
use super::base64url;
use super::challenge::ChallengeLedger;
use super::client_data::CollectedClientData;
use super::crypto::CryptoBackend;
use super::errors::CeremonyError;
use super::policy::RelyingPartyPolicy;
use super::store::UserStore;
use super::types::{AuthenticationResponse, AuthenticationResult, CeremonyKind};

/// Verifies authentication responses against stored credentials
#[derive(Clone)]
pub struct AuthenticationVerifier {
    ledger: ChallengeLedger,
    store: Arc<dyn UserStore>,
    crypto: Arc<dyn CryptoBackend>,
    policy: Arc<dyn RelyingPartyPolicy>,
    require_user_verification: bool,
}

impl AuthenticationVerifier {
    #[must_use]
    pub fn new(
        ledger: ChallengeLedger,
        store: Arc<dyn UserStore>,
        crypto: Arc<dyn CryptoBackend>,
        policy: Arc<dyn RelyingPartyPolicy>,
        require_user_verification: bool,
    ) -> Self {
        Self {
            ledger,
            store,
            crypto,
            policy,
            require_user_verification,
        }
    }

    /// Verify an assertion for `account`
    ///
    /// Counter bookkeeping is left to the caller; the result carries the
    /// counter the authenticator reported.
    ///
    /// # Errors
    /// - `MalformedInput` for undecodable client data, authenticator data or
    ///   signature
    /// - `InvalidCeremonyType` if client data is not `webauthn.get`
    /// - `ChallengeMismatch` / `ChallengeExpired` for a missing, different or
    ///   stale challenge
    /// - `OriginMismatch` / `RelyingPartyMismatch` from the relying party policy
    /// - `UnknownUser` / `UnknownCredential` if the credential is not registered
    /// - `UserPresenceMissing` / `UserVerificationMissing` for missing flags
    /// - `SignatureInvalid` if the signature does not verify
    pub fn verify_assertion(
        &self,
        account: &str,
        response: &AuthenticationResponse,
    ) -> Result<AuthenticationResult, CeremonyError> {
        let client_data = CollectedClientData::decode(&response.response.client_data_json)?;
        client_data.expect_kind(CeremonyKind::Authentication)?;

        let challenge = self.ledger.consume(account, CeremonyKind::Authentication)?;
        client_data.expect_challenge(&challenge.value)?;
        self.policy.check_origin(&client_data.parsed.origin)?;

        let auth_data_bytes =
            base64url::decode_field("authenticatorData", &response.response.authenticator_data)?;
        let signature = base64url::decode_field("signature", &response.response.signature)?;

        let user = self.store.get(account)?.ok_or(CeremonyError::UnknownUser)?;
        let credential = user
            .credential(&response.id)
            .ok_or(CeremonyError::UnknownCredential)?;

        let auth_data = AuthenticatorData::parse(&auth_data_bytes)?;
        self.policy.check_rp_id_hash(&auth_data.rp_id_hash)?;
        auth_data.require_user_flags(self.require_user_verification)?;

        let client_data_hash = self.crypto.sha256(&client_data.raw);
        let mut signed = auth_data_bytes;
        signed.extend_from_slice(&client_data_hash);
        self.crypto
            .verify_es256(&credential.public_key, &signed, &signature)?;

        debug!(
            "Assertion signature valid for credential {} (counter {})",
            credential.id, auth_data.sign_count
        );
        info!("Authentication verified for {account}");

        Ok(AuthenticationResult {
            credential_id: credential.id.clone(),
            sign_count: auth_data.sign_count,
            user_verified: auth_data.user_verified(),
            authenticated_at: Utc::now(),
        })
    }

    /// Boolean form of [`AuthenticationVerifier::verify_assertion`]
    ///
    /// A signature that does not verify yields `Ok(false)`.
    ///
    /// # Errors
    /// Every failure other than `SignatureInvalid`.
    pub fn verify_authentication(
        &self,
        account: &str,
        response: &AuthenticationResponse,
    ) -> Result<bool, CeremonyError> {
        match self.verify_assertion(account, response) {
            Ok(_) => Ok(true),
            Err(CeremonyError::SignatureInvalid) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
