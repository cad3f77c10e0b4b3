//! `WebAuthn` error types
//!
//! Every ceremony step reports failure through [`CeremonyError`]. Detail strings
//! attached to variants are meant for logs only.

use thiserror::Error;

/// Errors that can occur while running a registration or authentication ceremony
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CeremonyError {
    /// Decode or structural failure on any base64, JSON or binary payload
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// `clientData.type` does not match the ceremony being verified
    #[error("Invalid ceremony type")]
    InvalidCeremonyType,

    /// No pending challenge, or the echoed challenge differs from the issued one
    #[error("Challenge mismatch")]
    ChallengeMismatch,

    /// The pending challenge outlived its time-to-live
    #[error("Challenge expired")]
    ChallengeExpired,

    /// Registration authenticator data lacks the attested credential block
    #[error("Missing attested credential data")]
    MissingCredentialData,

    /// Assertion references a credential the user never registered
    #[error("Unknown credential")]
    UnknownCredential,

    /// Cryptographic verification failed
    #[error("Signature verification failed")]
    SignatureInvalid,

    /// Key type, curve or algorithm outside ES256 / P-256
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// `clientData.origin` is not an allowed origin
    #[error("Origin mismatch")]
    OriginMismatch,

    /// `rpIdHash` in the authenticator data does not hash the configured RP ID
    #[error("Relying party ID hash mismatch")]
    RelyingPartyMismatch,

    /// The user-present flag is not set
    #[error("User presence flag not set")]
    UserPresenceMissing,

    /// User verification was required but the flag is not set
    #[error("User verification flag not set")]
    UserVerificationMissing,

    /// The signature counter did not advance; the authenticator may be cloned
    #[error("Signature counter did not increase")]
    CounterRegression,

    /// No such user, or the user has nothing to authenticate with
    #[error("Unknown user")]
    UnknownUser,

    /// The credential id is already registered for this user
    #[error("Credential already registered")]
    DuplicateCredential,

    /// A crypto primitive failed for reasons unrelated to the input
    #[error("Crypto backend error: {0}")]
    Crypto(String),

    /// The user store failed
    #[error("User store error: {0}")]
    Store(String),
}

impl CeremonyError {
    /// Generic message safe to return to a client.
    ///
    /// Parser internals and store details stay in the logs.
    #[must_use]
    pub fn client_message(&self) -> &'static str {
        match self {
            CeremonyError::MalformedInput(_)
            | CeremonyError::InvalidCeremonyType
            | CeremonyError::MissingCredentialData
            | CeremonyError::UnsupportedAlgorithm(_) => "Invalid credential response",
            CeremonyError::ChallengeMismatch
            | CeremonyError::ChallengeExpired
            | CeremonyError::OriginMismatch
            | CeremonyError::RelyingPartyMismatch => "Ceremony could not be verified",
            CeremonyError::UnknownCredential
            | CeremonyError::SignatureInvalid
            | CeremonyError::UserPresenceMissing
            | CeremonyError::UserVerificationMissing
            | CeremonyError::CounterRegression
            | CeremonyError::UnknownUser => "Authentication failed",
            CeremonyError::DuplicateCredential => "Registration failed",
            CeremonyError::Crypto(_) | CeremonyError::Store(_) => "Internal error",
        }
    }

    /// Whether the failure is on the server side rather than in the client input
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, CeremonyError::Crypto(_) | CeremonyError::Store(_))
    }
}

/// Result alias for ceremony operations
pub type CeremonyResult<T> = Result<T, CeremonyError>;
