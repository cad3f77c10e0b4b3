//! Builders for ceremony payloads
//!
//! These produce the byte-level structures an authenticator and a browser
//! would send, so tests can bend any single field without re-deriving the rest.

use ciborium::value::Value;
use ring::digest;
use serde_json::json;

use crate::webauthn::authenticator_data::flags;
use crate::webauthn::CeremonyError;

/// `clientDataJSON` bytes as a browser would serialize them
#[must_use]
pub fn client_data_json(client_data_type: &str, challenge: &str, origin: &str) -> Vec<u8> {
    json!({
        "type": client_data_type,
        "challenge": challenge,
        "origin": origin,
        "crossOrigin": false,
    })
    .to_string()
    .into_bytes()
}

/// Serialize a CBOR value
///
/// # Errors
/// Returns `MalformedInput` if the value cannot be serialized.
pub fn to_cbor(value: &Value) -> Result<Vec<u8>, CeremonyError> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out)
        .map_err(|e| CeremonyError::MalformedInput(format!("CBOR encoding failed: {e}")))?;
    Ok(out)
}

/// COSE EC2 / ES256 / P-256 key map for an uncompressed SEC1 point
#[must_use]
pub fn cose_ec2_key(point: &[u8]) -> Value {
    let x = point.get(1..33).unwrap_or_default().to_vec();
    let y = point.get(33..65).unwrap_or_default().to_vec();
    Value::Map(vec![
        (Value::Integer(1.into()), Value::Integer(2.into())),
        (Value::Integer(3.into()), Value::Integer((-7).into())),
        (Value::Integer((-1).into()), Value::Integer(1.into())),
        (Value::Integer((-2).into()), Value::Bytes(x)),
        (Value::Integer((-3).into()), Value::Bytes(y)),
    ])
}

/// `none`-format attestation object wrapping `auth_data`
///
/// # Errors
/// Returns `MalformedInput` if encoding fails.
pub fn attestation_object(auth_data: &[u8]) -> Result<Vec<u8>, CeremonyError> {
    to_cbor(&Value::Map(vec![
        (Value::Text("fmt".to_string()), Value::Text("none".to_string())),
        (Value::Text("attStmt".to_string()), Value::Map(Vec::new())),
        (
            Value::Text("authData".to_string()),
            Value::Bytes(auth_data.to_vec()),
        ),
    ]))
}

/// Builder for raw authenticator data
pub struct AuthenticatorDataBuilder {
    rp_id: String,
    flags: u8,
    sign_count: u32,
    attested: Option<(Vec<u8>, Vec<u8>)>,
    extensions: Option<Vec<u8>>,
}

impl AuthenticatorDataBuilder {
    /// Start with the UP flag set and a zero counter
    #[must_use]
    pub fn new(rp_id: &str) -> Self {
        Self {
            rp_id: rp_id.to_string(),
            flags: flags::USER_PRESENT,
            sign_count: 0,
            attested: None,
            extensions: None,
        }
    }

    /// Replace the user flags (AT and ED are managed by the builder)
    #[must_use]
    pub fn flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn sign_count(mut self, sign_count: u32) -> Self {
        self.sign_count = sign_count;
        self
    }

    /// Append an attested credential block with a zero AAGUID
    #[must_use]
    pub fn attested_credential(mut self, credential_id: &[u8], cose_key: &[u8]) -> Self {
        self.attested = Some((credential_id.to_vec(), cose_key.to_vec()));
        self
    }

    /// Append raw extension bytes
    #[must_use]
    pub fn extensions(mut self, extensions: &[u8]) -> Self {
        self.extensions = Some(extensions.to_vec());
        self
    }

    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let mut flags = self.flags;
        if self.attested.is_some() {
            flags |= flags::ATTESTED_CREDENTIAL_DATA;
        }
        if self.extensions.is_some() {
            flags |= flags::EXTENSION_DATA;
        }

        let mut data = digest::digest(&digest::SHA256, self.rp_id.as_bytes())
            .as_ref()
            .to_vec();
        data.push(flags);
        data.extend_from_slice(&self.sign_count.to_be_bytes());

        if let Some((credential_id, cose_key)) = &self.attested {
            data.extend_from_slice(&[0u8; 16]);
            let id_len = u16::try_from(credential_id.len()).unwrap_or(u16::MAX);
            data.extend_from_slice(&id_len.to_be_bytes());
            data.extend_from_slice(credential_id);
            data.extend_from_slice(cose_key);
        }
        if let Some(extensions) = &self.extensions {
            data.extend_from_slice(extensions);
        }
        data
    }
}
