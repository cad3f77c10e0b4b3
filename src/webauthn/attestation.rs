//! Registration (attestation) verification
//!
//! Checks a `navigator.credentials.create()` response against the pending
//! registration challenge and extracts the credential to store. Attestation
//! statements are not verified; only `authData` is used.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};

use super::authenticator_data::AuthenticatorData;
use super::base64url;
use super::cbor;
use super::challenge::ChallengeLedger;
use super::client_data::CollectedClientData;
use super::cose::CoseKey;
use super::errors::CeremonyError;
use super::policy::RelyingPartyPolicy;
use super::types::{CeremonyKind, Credential, RegistrationResponse};

/// Verifies registration responses
#[derive(Clone)]
pub struct RegistrationVerifier {
    ledger: ChallengeLedger,
    policy: Arc<dyn RelyingPartyPolicy>,
    require_user_verification: bool,
}

impl RegistrationVerifier {
    #[must_use]
    pub fn new(
        ledger: ChallengeLedger,
        policy: Arc<dyn RelyingPartyPolicy>,
        require_user_verification: bool,
    ) -> Self {
        Self {
            ledger,
            policy,
            require_user_verification,
        }
    }

    /// Verify a registration response for `account`
    ///
    /// The ceremony type is checked before the pending challenge is touched;
    /// from the challenge comparison onwards the challenge is spent whatever
    /// the outcome.
    ///
    /// # Errors
    /// - `MalformedInput` for undecodable client data, attestation object or
    ///   authenticator data, a credential ID that disagrees with `id` or
    ///   `rawId`, or a public key that is not a P-256 point
    /// - `InvalidCeremonyType` if client data is not `webauthn.create`
    /// - `ChallengeMismatch` / `ChallengeExpired` for a missing, different or
    ///   stale challenge
    /// - `OriginMismatch` / `RelyingPartyMismatch` from the relying party policy
    /// - `MissingCredentialData` if the attested credential block is absent
    /// - `UserPresenceMissing` / `UserVerificationMissing` for missing flags
    /// - `UnsupportedAlgorithm` for keys other than ES256 on P-256
    pub fn verify_registration(
        &self,
        account: &str,
        response: &RegistrationResponse,
    ) -> Result<Credential, CeremonyError> {
        let client_data = CollectedClientData::decode(&response.response.client_data_json)?;
        client_data.expect_kind(CeremonyKind::Registration)?;

        let challenge = self.ledger.consume(account, CeremonyKind::Registration)?;
        client_data.expect_challenge(&challenge.value)?;
        self.policy.check_origin(&client_data.parsed.origin)?;

        let attestation_bytes =
            base64url::decode_field("attestationObject", &response.response.attestation_object)?;
        let attestation = cbor::parse_attestation_object(&attestation_bytes)?;
        let auth_data = AuthenticatorData::parse(&attestation.auth_data)?;

        let attested = auth_data
            .attested_credential
            .as_ref()
            .ok_or(CeremonyError::MissingCredentialData)?;
        self.policy.check_rp_id_hash(&auth_data.rp_id_hash)?;
        auth_data.require_user_flags(self.require_user_verification)?;

        let id = base64url::decode_field("id", &response.id)?;
        if id != attested.credential_id {
            return Err(CeremonyError::MalformedInput(
                "credential ID in authenticator data differs from id".to_string(),
            ));
        }
        if !response.raw_id.is_empty() {
            let raw_id = base64url::decode_field("rawId", &response.raw_id)?;
            if raw_id != attested.credential_id {
                return Err(CeremonyError::MalformedInput(
                    "credential ID in authenticator data differs from rawId".to_string(),
                ));
            }
        }

        let key = CoseKey::from_cbor(&attested.public_key)?;
        key.validate_point()?;
        debug!(
            "Registration key accepted: fmt={:?}, credential id {} bytes",
            attestation.fmt,
            attested.credential_id.len()
        );

        info!("Registration verified for {account}");
        // Counting starts at the first assertion, whatever the authenticator reports here
        Ok(Credential {
            id: response.id.clone(),
            public_key: key.to_spki_der(),
            sign_count: 0,
            created_at: Utc::now(),
            last_used: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::builders::{
        attestation_object, client_data_json, cose_ec2_key, to_cbor, AuthenticatorDataBuilder,
    };
    use crate::testing::constants::{TEST_EMAIL, TEST_ORIGIN, TEST_RP_ID};
    use crate::testing::{SoftAuthenticator, TestFixtures};
    use crate::webauthn::authenticator_data::flags;
    use crate::webauthn::cose;
    use crate::webauthn::types::AuthenticatorAttestationResponse;

    struct Rig {
        verifier: RegistrationVerifier,
        ledger: ChallengeLedger,
    }

    fn rig(require_user_verification: bool) -> Rig {
        let (store, crypto) = TestFixtures::store_with_user(TEST_EMAIL);
        let ledger = TestFixtures::ledger(store, crypto.clone());
        let verifier = RegistrationVerifier::new(
            ledger.clone(),
            TestFixtures::policy(crypto.as_ref()),
            require_user_verification,
        );
        Rig { verifier, ledger }
    }

    fn issue(rig: &Rig) -> String {
        let challenge = rig
            .ledger
            .issue(TEST_EMAIL, CeremonyKind::Registration)
            .unwrap();
        base64url::encode(challenge.value)
    }

    /// Registration response carrying hand-built authenticator data
    fn response_with_auth_data(challenge: &str, auth_data: &[u8]) -> RegistrationResponse {
        RegistrationResponse {
            id: base64url::encode(b"cred"),
            raw_id: String::new(),
            r#type: "public-key".to_string(),
            response: AuthenticatorAttestationResponse {
                client_data_json: base64url::encode(client_data_json(
                    "webauthn.create",
                    challenge,
                    TEST_ORIGIN,
                )),
                attestation_object: base64url::encode(attestation_object(auth_data).unwrap()),
            },
            client_extension_results: None,
        }
    }

    #[test]
    fn test_valid_registration_yields_credential() {
        let rig = rig(false);
        let authenticator = SoftAuthenticator::new(TEST_RP_ID, TEST_ORIGIN).unwrap();
        let response = authenticator.register(&issue(&rig)).unwrap();

        let credential = rig
            .verifier
            .verify_registration(TEST_EMAIL, &response)
            .unwrap();
        assert_eq!(credential.id, authenticator.credential_id());
        assert_eq!(credential.public_key, authenticator.public_key_spki());
        assert_eq!(credential.public_key.len(), cose::P256_SPKI_LEN);
        assert_eq!(credential.sign_count, 0);
        assert!(credential.last_used.is_none());
    }

    #[test]
    fn test_challenge_is_single_use() {
        let rig = rig(false);
        let authenticator = SoftAuthenticator::new(TEST_RP_ID, TEST_ORIGIN).unwrap();
        let response = authenticator.register(&issue(&rig)).unwrap();

        assert!(rig.verifier.verify_registration(TEST_EMAIL, &response).is_ok());
        assert_eq!(
            rig.verifier.verify_registration(TEST_EMAIL, &response),
            Err(CeremonyError::ChallengeMismatch)
        );
    }

    #[test]
    fn test_wrong_challenge_spends_pending_one() {
        let rig = rig(false);
        let authenticator = SoftAuthenticator::new(TEST_RP_ID, TEST_ORIGIN).unwrap();
        let issued = issue(&rig);
        let forged = authenticator.register(&base64url::encode([9u8; 32])).unwrap();

        assert_eq!(
            rig.verifier.verify_registration(TEST_EMAIL, &forged),
            Err(CeremonyError::ChallengeMismatch)
        );
        let honest = authenticator.register(&issued).unwrap();
        assert_eq!(
            rig.verifier.verify_registration(TEST_EMAIL, &honest),
            Err(CeremonyError::ChallengeMismatch)
        );
    }

    #[test]
    fn test_wrong_type_keeps_challenge_pending() {
        let rig = rig(false);
        let authenticator = SoftAuthenticator::new(TEST_RP_ID, TEST_ORIGIN).unwrap();
        let challenge = issue(&rig);

        let mut response = authenticator.register(&challenge).unwrap();
        response.response.client_data_json =
            base64url::encode(client_data_json("webauthn.get", &challenge, TEST_ORIGIN));
        assert_eq!(
            rig.verifier.verify_registration(TEST_EMAIL, &response),
            Err(CeremonyError::InvalidCeremonyType)
        );

        let response = authenticator.register(&challenge).unwrap();
        assert!(rig.verifier.verify_registration(TEST_EMAIL, &response).is_ok());
    }

    #[test]
    fn test_foreign_origin_rejected() {
        let rig = rig(false);
        let mut authenticator = SoftAuthenticator::new(TEST_RP_ID, TEST_ORIGIN).unwrap();
        authenticator.set_origin("https://evil.example");
        let response = authenticator.register(&issue(&rig)).unwrap();

        assert_eq!(
            rig.verifier.verify_registration(TEST_EMAIL, &response),
            Err(CeremonyError::OriginMismatch)
        );
    }

    #[test]
    fn test_foreign_rp_id_rejected() {
        let rig = rig(false);
        let authenticator = SoftAuthenticator::new("example.com", TEST_ORIGIN).unwrap();
        let response = authenticator.register(&issue(&rig)).unwrap();

        assert_eq!(
            rig.verifier.verify_registration(TEST_EMAIL, &response),
            Err(CeremonyError::RelyingPartyMismatch)
        );
    }

    #[test]
    fn test_missing_attested_credential() {
        let rig = rig(false);
        let auth_data = AuthenticatorDataBuilder::new(TEST_RP_ID).build();
        let response = response_with_auth_data(&issue(&rig), &auth_data);

        assert_eq!(
            rig.verifier.verify_registration(TEST_EMAIL, &response),
            Err(CeremonyError::MissingCredentialData)
        );
    }

    #[test]
    fn test_user_flags_enforced() {
        let rig = rig(true);
        let authenticator = SoftAuthenticator::new(TEST_RP_ID, TEST_ORIGIN)
            .unwrap()
            .with_flags(flags::USER_PRESENT);
        let response = authenticator.register(&issue(&rig)).unwrap();
        assert_eq!(
            rig.verifier.verify_registration(TEST_EMAIL, &response),
            Err(CeremonyError::UserVerificationMissing)
        );

        let authenticator = SoftAuthenticator::new(TEST_RP_ID, TEST_ORIGIN)
            .unwrap()
            .with_flags(0);
        let response = authenticator.register(&issue(&rig)).unwrap();
        assert_eq!(
            rig.verifier.verify_registration(TEST_EMAIL, &response),
            Err(CeremonyError::UserPresenceMissing)
        );
    }

    #[test]
    fn test_raw_id_must_match_auth_data() {
        let rig = rig(false);
        let authenticator = SoftAuthenticator::new(TEST_RP_ID, TEST_ORIGIN).unwrap();
        let mut response = authenticator.register(&issue(&rig)).unwrap();
        response.raw_id = base64url::encode(b"some other credential");

        assert!(matches!(
            rig.verifier.verify_registration(TEST_EMAIL, &response),
            Err(CeremonyError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_registration_counter_starts_at_zero() {
        let rig = rig(false);
        let mut authenticator = SoftAuthenticator::new(TEST_RP_ID, TEST_ORIGIN).unwrap();
        authenticator.set_sign_count(41);
        let response = authenticator.register(&issue(&rig)).unwrap();

        let credential = rig
            .verifier
            .verify_registration(TEST_EMAIL, &response)
            .unwrap();
        assert_eq!(credential.sign_count, 0);
    }

    #[test]
    fn test_id_must_match_auth_data_without_raw_id() {
        let rig = rig(false);
        let authenticator = SoftAuthenticator::new(TEST_RP_ID, TEST_ORIGIN).unwrap();
        let mut response = authenticator.register(&issue(&rig)).unwrap();
        response.raw_id = String::new();
        response.id = base64url::encode(b"chosen by the client");

        assert!(matches!(
            rig.verifier.verify_registration(TEST_EMAIL, &response),
            Err(CeremonyError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_off_curve_key_rejected() {
        let rig = rig(false);
        let key = to_cbor(&cose_ec2_key(&[0x04; 65])).unwrap();
        let auth_data = AuthenticatorDataBuilder::new(TEST_RP_ID)
            .attested_credential(b"cred", &key)
            .build();
        let response = response_with_auth_data(&issue(&rig), &auth_data);

        assert!(matches!(
            rig.verifier.verify_registration(TEST_EMAIL, &response),
            Err(CeremonyError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_rsa_key_rejected() {
        let rig = rig(false);
        let rsa_key = to_cbor(&ciborium::value::Value::Map(vec![
            (
                ciborium::value::Value::Integer(1.into()),
                ciborium::value::Value::Integer(3.into()),
            ),
            (
                ciborium::value::Value::Integer(3.into()),
                ciborium::value::Value::Integer((-257).into()),
            ),
        ]))
        .unwrap();
        let auth_data = AuthenticatorDataBuilder::new(TEST_RP_ID)
            .attested_credential(b"cred", &rsa_key)
            .build();
        let response = response_with_auth_data(&issue(&rig), &auth_data);

        assert!(matches!(
            rig.verifier.verify_registration(TEST_EMAIL, &response),
            Err(CeremonyError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_truncated_auth_data_rejected() {
        let rig = rig(false);
        let key = to_cbor(&cose_ec2_key(&[0x04; 65])).unwrap();
        let mut auth_data = AuthenticatorDataBuilder::new(TEST_RP_ID)
            .attested_credential(b"credential", &key)
            .build();
        auth_data.truncate(60);
        let response = response_with_auth_data(&issue(&rig), &auth_data);

        assert!(matches!(
            rig.verifier.verify_registration(TEST_EMAIL, &response),
            Err(CeremonyError::MalformedInput(_))
        ));
    }
}
