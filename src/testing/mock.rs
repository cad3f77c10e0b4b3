//! Software authenticator
//!
//! Holds a real P-256 key pair and answers registration and authentication
//! challenges the way a platform authenticator would, so ceremony tests run
//! end to end without fixtures captured from a browser.

use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};

use super::builders::{
    attestation_object, client_data_json, cose_ec2_key, to_cbor, AuthenticatorDataBuilder,
};
use crate::webauthn::authenticator_data::flags;
use crate::webauthn::{
    base64url, cose, AuthenticationResponse, AuthenticatorAssertionResponse,
    AuthenticatorAttestationResponse, CeremonyError, RegistrationResponse,
};

/// P-256 authenticator living in memory
pub struct SoftAuthenticator {
    key_pair: EcdsaKeyPair,
    rng: SystemRandom,
    credential_id: Vec<u8>,
    rp_id: String,
    origin: String,
    flags: u8,
    sign_count: u32,
    counting: bool,
}

impl SoftAuthenticator {
    /// Generate a fresh key pair and a random 16-byte credential ID
    ///
    /// # Errors
    /// Returns `Crypto` if key generation fails.
    pub fn new(rp_id: &str, origin: &str) -> Result<Self, CeremonyError> {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
            .map_err(|_| CeremonyError::Crypto("key generation failed".to_string()))?;
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref(), &rng)
                .map_err(|_| CeremonyError::Crypto("key import failed".to_string()))?;

        let mut credential_id = vec![0u8; 16];
        rng.fill(&mut credential_id)
            .map_err(|_| CeremonyError::Crypto("random source failed".to_string()))?;

        Ok(Self {
            key_pair,
            rng,
            credential_id,
            rp_id: rp_id.to_string(),
            origin: origin.to_string(),
            flags: flags::USER_PRESENT | flags::USER_VERIFIED,
            sign_count: 0,
            counting: true,
        })
    }

    /// Override the UP/UV flags reported from now on
    #[must_use]
    pub fn with_flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    /// Report a zero counter on every assertion
    #[must_use]
    pub fn without_counter(mut self) -> Self {
        self.counting = false;
        self
    }

    /// Change the origin placed in client data
    pub fn set_origin(&mut self, origin: &str) {
        self.origin = origin.to_string();
    }

    /// Force the internal counter, e.g. to simulate a cloned authenticator
    pub fn set_sign_count(&mut self, sign_count: u32) {
        self.sign_count = sign_count;
    }

    /// Base64url credential ID
    #[must_use]
    pub fn credential_id(&self) -> String {
        base64url::encode(&self.credential_id)
    }

    /// SubjectPublicKeyInfo DER of the credential key
    #[must_use]
    pub fn public_key_spki(&self) -> Vec<u8> {
        let mut der = cose::P256_SPKI_PREFIX.to_vec();
        der.extend_from_slice(self.key_pair.public_key().as_ref());
        der
    }

    /// Answer a registration challenge (base64url, as found in the options)
    ///
    /// # Errors
    /// Returns `MalformedInput` if the COSE key cannot be encoded.
    pub fn register(&self, challenge: &str) -> Result<RegistrationResponse, CeremonyError> {
        let client_data = client_data_json("webauthn.create", challenge, &self.origin);
        let cose_key = to_cbor(&cose_ec2_key(self.key_pair.public_key().as_ref()))?;
        let auth_data = AuthenticatorDataBuilder::new(&self.rp_id)
            .flags(self.flags)
            .sign_count(self.sign_count)
            .attested_credential(&self.credential_id, &cose_key)
            .build();

        Ok(RegistrationResponse {
            id: self.credential_id(),
            raw_id: self.credential_id(),
            r#type: "public-key".to_string(),
            response: AuthenticatorAttestationResponse {
                client_data_json: base64url::encode(&client_data),
                attestation_object: base64url::encode(attestation_object(&auth_data)?),
            },
            client_extension_results: None,
        })
    }

    /// Answer an authentication challenge, advancing the counter first
    ///
    /// # Errors
    /// Returns `Crypto` if signing fails.
    pub fn authenticate(
        &mut self,
        challenge: &str,
    ) -> Result<AuthenticationResponse, CeremonyError> {
        if self.counting {
            self.sign_count = self.sign_count.wrapping_add(1);
        }
        let sign_count = if self.counting { self.sign_count } else { 0 };

        let client_data = client_data_json("webauthn.get", challenge, &self.origin);
        let auth_data = AuthenticatorDataBuilder::new(&self.rp_id)
            .flags(self.flags)
            .sign_count(sign_count)
            .build();
        let signature = self.sign(&auth_data, &client_data)?;

        Ok(AuthenticationResponse {
            id: self.credential_id(),
            raw_id: self.credential_id(),
            r#type: "public-key".to_string(),
            response: AuthenticatorAssertionResponse {
                client_data_json: base64url::encode(&client_data),
                authenticator_data: base64url::encode(&auth_data),
                signature: base64url::encode(signature),
                user_handle: None,
            },
            client_extension_results: None,
        })
    }

    /// ES256 signature over `auth_data || SHA-256(client_data)`
    ///
    /// # Errors
    /// Returns `Crypto` if signing fails.
    pub fn sign(&self, auth_data: &[u8], client_data: &[u8]) -> Result<Vec<u8>, CeremonyError> {
        let client_data_hash = ring::digest::digest(&ring::digest::SHA256, client_data);
        let mut message = auth_data.to_vec();
        message.extend_from_slice(client_data_hash.as_ref());
        let signature = self
            .key_pair
            .sign(&self.rng, &message)
            .map_err(|_| CeremonyError::Crypto("signing failed".to_string()))?;
        Ok(signature.as_ref().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_advances_per_assertion() {
        let mut authenticator = SoftAuthenticator::new("localhost", "https://localhost").unwrap();
        let first = authenticator.authenticate("AQID").unwrap();
        let second = authenticator.authenticate("AQID").unwrap();

        let count = |r: &AuthenticationResponse| {
            let data = base64url::decode(&r.response.authenticator_data).unwrap();
            u32::from_be_bytes([data[33], data[34], data[35], data[36]])
        };
        assert_eq!(count(&first), 1);
        assert_eq!(count(&second), 2);
    }

    #[test]
    fn test_public_key_is_p256_spki() {
        let authenticator = SoftAuthenticator::new("localhost", "https://localhost").unwrap();
        let der = authenticator.public_key_spki();
        assert_eq!(der.len(), cose::P256_SPKI_LEN);
        assert!(cose::uncompressed_point_from_spki(&der).is_ok());
    }
}
