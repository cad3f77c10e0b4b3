//! `WebAuthn` core types
//!
//! Wire types mirror the JSON the browser produces and consumes (camelCase
//! field names, base64url byte buffers). Domain types describe what the
//! server keeps per user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which ceremony a challenge or client data belongs to
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CeremonyKind {
    Registration,
    Authentication,
}

impl CeremonyKind {
    /// Expected `clientData.type` for this ceremony
    #[must_use]
    pub fn client_data_type(self) -> &'static str {
        match self {
            CeremonyKind::Registration => "webauthn.create",
            CeremonyKind::Authentication => "webauthn.get",
        }
    }
}

impl std::fmt::Display for CeremonyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CeremonyKind::Registration => write!(f, "registration"),
            CeremonyKind::Authentication => write!(f, "authentication"),
        }
    }
}

/// `WebAuthn` registration options sent to the client
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RegistrationOptions {
    pub rp: RelyingParty,  // Relying party information
    pub user: UserEntity,  // User information
    pub challenge: String, // Base64URL-encoded random challenge
    #[serde(rename = "pubKeyCredParams")]
    pub public_key_params: Vec<PublicKeyCredentialParameters>, // Allowed algorithms
    #[serde(rename = "authenticatorSelection")]
    pub authenticator_selection: AuthenticatorSelectionCriteria,
    pub timeout: u32,        // Timeout in milliseconds
    pub attestation: String, // Always "none"
}

/// `WebAuthn` authentication options sent to the client
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AuthenticationOptions {
    pub challenge: String, // Base64URL-encoded random challenge
    #[serde(rename = "rpId")]
    pub rp_id: String, // Relying party ID
    #[serde(rename = "allowCredentials")]
    pub allow_credentials: Vec<PublicKeyCredentialDescriptor>,
    #[serde(rename = "userVerification")]
    pub user_verification: String, // "required", "preferred", "discouraged"
    pub timeout: u32,               // Timeout in milliseconds
}

/// `WebAuthn` relying party information
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RelyingParty {
    pub id: String,   // Domain name (e.g., "example.com")
    pub name: String, // Display name
}

/// `WebAuthn` user entity
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserEntity {
    pub id: String,   // Base64URL-encoded user handle
    pub name: String, // Username (e.g., email)
    #[serde(rename = "displayName")]
    pub display_name: String,
}

/// Public key credential parameters
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PublicKeyCredentialParameters {
    #[serde(rename = "type")]
    pub r#type: String, // Always "public-key"
    pub alg: i64,       // -7 (ES256)
}

/// Authenticator selection criteria
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AuthenticatorSelectionCriteria {
    #[serde(rename = "residentKey")]
    pub resident_key: String, // "discouraged", "preferred", "required"
    #[serde(rename = "userVerification")]
    pub user_verification: String,
    #[serde(
        rename = "authenticatorAttachment",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub authenticator_attachment: Option<String>, // "platform", "cross-platform"
}

/// Public key credential descriptor
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PublicKeyCredentialDescriptor {
    #[serde(rename = "type")]
    pub r#type: String, // Always "public-key"
    pub id: String,     // Base64URL-encoded credential ID
}

/// Registration response from client
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RegistrationResponse {
    pub id: String, // Base64URL-encoded credential ID
    #[serde(rename = "rawId", default)]
    pub raw_id: String,
    #[serde(rename = "type", default = "default_credential_type")]
    pub r#type: String,
    pub response: AuthenticatorAttestationResponse,
    #[serde(
        rename = "clientExtensionResults",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub client_extension_results: Option<serde_json::Value>,
}

/// Authentication response from client
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AuthenticationResponse {
    pub id: String, // Base64URL-encoded credential ID
    #[serde(rename = "rawId", default)]
    pub raw_id: String,
    #[serde(rename = "type", default = "default_credential_type")]
    pub r#type: String,
    pub response: AuthenticatorAssertionResponse,
    #[serde(
        rename = "clientExtensionResults",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub client_extension_results: Option<serde_json::Value>,
}

/// Authenticator attestation response during registration
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AuthenticatorAttestationResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    #[serde(rename = "attestationObject")]
    pub attestation_object: String,
}

/// Authenticator assertion response during authentication
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AuthenticatorAssertionResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    #[serde(rename = "authenticatorData")]
    pub authenticator_data: String,
    pub signature: String,
    #[serde(rename = "userHandle", default)]
    pub user_handle: Option<String>,
}

fn default_credential_type() -> String {
    "public-key".to_string()
}

/// Challenge waiting to be echoed back by the client
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PendingChallenge {
    pub value: Vec<u8>,
    pub kind: CeremonyKind,
    pub issued_at: DateTime<Utc>,
}

/// Registered credential
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    pub id: String,                       // Base64URL-encoded credential ID
    pub public_key: Vec<u8>,              // SubjectPublicKeyInfo DER
    pub sign_count: u32,                  // Signature counter
    pub created_at: DateTime<Utc>,        // When credential was created
    pub last_used: Option<DateTime<Utc>>, // When credential was last used
}

/// User aggregate owned by the store
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct User {
    pub id: Vec<u8>, // WebAuthn user handle
    pub email: String,
    pub credentials: Vec<Credential>,
    pub pending_challenge: Option<PendingChallenge>,
}

impl User {
    /// New user with no credentials and nothing pending
    #[must_use]
    pub fn new(id: Vec<u8>, email: &str) -> Self {
        Self {
            id,
            email: email.to_string(),
            credentials: Vec::new(),
            pending_challenge: None,
        }
    }

    /// Find a registered credential by its base64url id
    #[must_use]
    pub fn credential(&self, credential_id: &str) -> Option<&Credential> {
        self.credentials.iter().find(|c| c.id == credential_id)
    }

    /// Mutable access to a registered credential
    pub fn credential_mut(&mut self, credential_id: &str) -> Option<&mut Credential> {
        self.credentials.iter_mut().find(|c| c.id == credential_id)
    }
}

/// Outcome of a verified assertion
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AuthenticationResult {
    pub credential_id: String,           // Base64URL-encoded credential ID
    pub sign_count: u32,                 // Counter reported by the authenticator
    pub user_verified: bool,             // UV flag
    pub authenticated_at: DateTime<Utc>, // When authentication completed
}
