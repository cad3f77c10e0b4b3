//! `WebAuthn` cryptography operations
//!
//! The ceremony logic only needs three primitives: random bytes for
//! challenges and user handles, SHA-256, and ES256 signature verification.
//! They sit behind [`CryptoBackend`] so the verifiers run identically whichever
//! implementation is plugged in.

use rand::RngCore;
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};
use ring::signature;
use sha2::{Digest, Sha256};

use super::cose;
use super::errors::CeremonyError;

/// Primitive operations the ceremonies depend on
pub trait CryptoBackend: Send + Sync {
    /// Fill `buf` with cryptographically secure random bytes
    ///
    /// # Errors
    /// Returns `Crypto` if the system random source fails.
    fn fill_random(&self, buf: &mut [u8]) -> Result<(), CeremonyError>;

    /// SHA-256 digest of `data`
    fn sha256(&self, data: &[u8]) -> [u8; 32];

    /// Verify a DER-encoded ES256 signature over `message`
    ///
    /// `public_key` is a P-256 SubjectPublicKeyInfo DER document.
    ///
    /// # Errors
    /// - `SignatureInvalid` if the signature does not verify
    /// - `MalformedInput` / `UnsupportedAlgorithm` if the key cannot be used
    fn verify_es256(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), CeremonyError>;

    /// Convenience wrapper around [`CryptoBackend::fill_random`]
    ///
    /// # Errors
    /// Returns `Crypto` if the system random source fails.
    fn random_bytes(&self, len: usize) -> Result<Vec<u8>, CeremonyError> {
        let mut bytes = vec![0u8; len];
        self.fill_random(&mut bytes)?;
        Ok(bytes)
    }
}

/// Backend built on `ring`
#[derive(Debug)]
pub struct RingBackend {
    rng: SystemRandom,
}

impl RingBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for RingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoBackend for RingBackend {
    fn fill_random(&self, buf: &mut [u8]) -> Result<(), CeremonyError> {
        self.rng
            .fill(buf)
            .map_err(|_| CeremonyError::Crypto("system random source failed".to_string()))
    }

    fn sha256(&self, data: &[u8]) -> [u8; 32] {
        let hash = digest::digest(&digest::SHA256, data);
        let mut out = [0u8; 32];
        out.copy_from_slice(hash.as_ref());
        out
    }

    fn verify_es256(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), CeremonyError> {
        // ring takes the bare SEC1 point rather than the SPKI wrapper
        let point = cose::uncompressed_point_from_spki(public_key)?;
        signature::UnparsedPublicKey::new(&signature::ECDSA_P256_SHA256_ASN1, point)
            .verify(message, signature)
            .map_err(|_| CeremonyError::SignatureInvalid)
    }
}

/// Backend built on the RustCrypto crates (`p256`, `sha2`, `rand`)
#[derive(Debug, Default, Clone, Copy)]
pub struct RustCryptoBackend;

impl CryptoBackend for RustCryptoBackend {
    fn fill_random(&self, buf: &mut [u8]) -> Result<(), CeremonyError> {
        rand::rng().fill_bytes(buf);
        Ok(())
    }

    fn sha256(&self, data: &[u8]) -> [u8; 32] {
        Sha256::digest(data).into()
    }

    fn verify_es256(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), CeremonyError> {
        use p256::ecdsa::signature::Verifier;
        use p256::ecdsa::{Signature, VerifyingKey};
        use p256::pkcs8::DecodePublicKey;

        // Same prefix check as the ring backend so both accept the same keys
        cose::uncompressed_point_from_spki(public_key)?;
        let verifying_key = VerifyingKey::from_public_key_der(public_key).map_err(|e| {
            CeremonyError::MalformedInput(format!("invalid P-256 public key: {e}"))
        })?;
        let signature =
            Signature::from_der(signature).map_err(|_| CeremonyError::SignatureInvalid)?;
        verifying_key
            .verify(message, &signature)
            .map_err(|_| CeremonyError::SignatureInvalid)
    }
}
