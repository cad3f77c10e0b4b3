//! COSE public key conversion
//!
//! Authenticators hand us their public key as a COSE_Key map. We normalize it
//! into [`CoseKey`] right after decoding and convert it to a
//! SubjectPublicKeyInfo DER document, which is what gets stored and what the
//! crypto backends verify against.

use ciborium::value::Value;
use p256::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};

use super::cbor::{self, Label};
use super::errors::{CeremonyError, CeremonyResult};

/// COSE key type EC2
pub const COSE_KTY_EC2: i64 = 2;
/// COSE algorithm ES256 (ECDSA w/ SHA-256)
pub const COSE_ALG_ES256: i64 = -7;
/// COSE curve P-256
pub const COSE_CRV_P256: i64 = 1;

const LABEL_KTY: i64 = 1;
const LABEL_ALG: i64 = 3;
const LABEL_CRV: i64 = -1;
const LABEL_X: i64 = -2;
const LABEL_Y: i64 = -3;
// Some encoders emit the coordinates under positive labels
const LABEL_X_COMPAT: i64 = 2;
const LABEL_Y_COMPAT: i64 = 3;

const COORDINATE_LEN: usize = 32;

/// DER prefix of a P-256 SubjectPublicKeyInfo, up to the uncompressed point
///
/// SEQUENCE(89) { SEQUENCE(19) { OID id-ecPublicKey, OID prime256v1 },
/// BIT STRING(66, 0 unused bits) }
pub const P256_SPKI_PREFIX: [u8; 26] = [
    0x30, 0x59, // SEQUENCE, 89 bytes
    0x30, 0x13, // SEQUENCE, 19 bytes
    0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, // 1.2.840.10045.2.1
    0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, // 1.2.840.10045.3.1.7
    0x03, 0x42, 0x00, // BIT STRING, 66 bytes, no unused bits
];

/// Length of the uncompressed SEC1 point `0x04 || x || y`
pub const UNCOMPRESSED_POINT_LEN: usize = 1 + 2 * COORDINATE_LEN;

/// Length of a P-256 SubjectPublicKeyInfo DER document
pub const P256_SPKI_LEN: usize = P256_SPKI_PREFIX.len() + UNCOMPRESSED_POINT_LEN;

/// EC2 public key in canonical form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseKey {
    pub kty: Option<i64>,
    pub alg: Option<i64>,
    pub curve: Option<i64>,
    pub x: [u8; 32],
    pub y: [u8; 32],
}

impl CoseKey {
    /// Normalize a decoded COSE key map
    ///
    /// # Errors
    /// - `MalformedInput` if the value is not a map or either coordinate is
    ///   missing or not exactly 32 bytes
    /// - `UnsupportedAlgorithm` if a present `kty`, `alg` or `crv` is not
    ///   EC2 / ES256 / P-256, including values that are not integers at all
    pub fn from_cbor(value: &Value) -> Result<Self, CeremonyError> {
        if !value.is_map() {
            return Err(CeremonyError::MalformedInput(
                "COSE key is not a map".to_string(),
            ));
        }

        let kty = header_param(value, LABEL_KTY, "key type")?;
        let alg = header_param(value, LABEL_ALG, "algorithm")?;
        let curve = header_param(value, LABEL_CRV, "curve")?;

        if let Some(kty) = kty.filter(|k| *k != COSE_KTY_EC2) {
            return Err(CeremonyError::UnsupportedAlgorithm(format!(
                "COSE key type {kty}"
            )));
        }
        if let Some(alg) = alg.filter(|a| *a != COSE_ALG_ES256) {
            return Err(CeremonyError::UnsupportedAlgorithm(format!(
                "COSE algorithm {alg}"
            )));
        }
        if let Some(curve) = curve.filter(|c| *c != COSE_CRV_P256) {
            return Err(CeremonyError::UnsupportedAlgorithm(format!(
                "COSE curve {curve}"
            )));
        }

        let x = coordinate(value, LABEL_X, LABEL_X_COMPAT, "x")?;
        let y = coordinate(value, LABEL_Y, LABEL_Y_COMPAT, "y")?;

        Ok(Self {
            kty,
            alg,
            curve,
            x,
            y,
        })
    }

    /// Decode and normalize raw COSE key bytes
    ///
    /// # Errors
    /// Same as [`CoseKey::from_cbor`], plus `MalformedInput` on invalid CBOR.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CeremonyError> {
        Self::from_cbor(&cbor::decode(bytes)?)
    }

    /// Uncompressed SEC1 point `0x04 || x || y`
    #[must_use]
    pub fn uncompressed_point(&self) -> [u8; UNCOMPRESSED_POINT_LEN] {
        let mut point = [0u8; UNCOMPRESSED_POINT_LEN];
        point[0] = 0x04;
        point[1..=COORDINATE_LEN].copy_from_slice(&self.x);
        point[1 + COORDINATE_LEN..].copy_from_slice(&self.y);
        point
    }

    /// Check that `(x, y)` lies on P-256
    ///
    /// # Errors
    /// Returns `MalformedInput` if the coordinates do not form a curve point.
    pub fn validate_point(&self) -> CeremonyResult<()> {
        p256::PublicKey::from_sec1_bytes(&self.uncompressed_point())
            .map(|_| ())
            .map_err(|_| CeremonyError::MalformedInput("COSE key is not a P-256 point".to_string()))
    }

    /// SubjectPublicKeyInfo DER encoding of the key
    #[must_use]
    pub fn to_spki_der(&self) -> Vec<u8> {
        let mut der = Vec::with_capacity(P256_SPKI_LEN);
        der.extend_from_slice(&P256_SPKI_PREFIX);
        der.extend_from_slice(&self.uncompressed_point());
        der
    }
}

/// Integer header parameter; absent is fine, present but unreadable is not
fn header_param(value: &Value, label: i64, name: &str) -> CeremonyResult<Option<i64>> {
    match cbor::map_lookup(value, Label::Int(label)) {
        None => Ok(None),
        // Byte string under label 3 is the compat y coordinate, not an alg
        Some(Value::Bytes(_)) if label == LABEL_Y_COMPAT => Ok(None),
        Some(_) => cbor::map_int(value, Label::Int(label)).map(Some).ok_or_else(|| {
            CeremonyError::UnsupportedAlgorithm(format!("COSE {name} is not an integer"))
        }),
    }
}

fn coordinate(
    value: &Value,
    label: i64,
    compat_label: i64,
    name: &str,
) -> Result<[u8; 32], CeremonyError> {
    // The compat label only counts when it actually carries a byte string;
    // label 3 is normally `alg`.
    let bytes = cbor::map_bytes(value, Label::Int(label))
        .or_else(|| cbor::map_bytes(value, Label::Int(compat_label)))
        .ok_or_else(|| {
            CeremonyError::MalformedInput(format!("COSE key missing {name} coordinate"))
        })?;

    <[u8; 32]>::try_from(bytes).map_err(|_| {
        CeremonyError::MalformedInput(format!(
            "COSE {name} coordinate is {} bytes, expected {COORDINATE_LEN}",
            bytes.len()
        ))
    })
}

/// Extract the uncompressed point from a P-256 SubjectPublicKeyInfo document
///
/// # Errors
/// - `MalformedInput` if the document has the wrong length
/// - `UnsupportedAlgorithm` if it is not a P-256 EC public key
pub fn uncompressed_point_from_spki(der: &[u8]) -> Result<&[u8], CeremonyError> {
    if der.len() != P256_SPKI_LEN {
        return Err(CeremonyError::MalformedInput(format!(
            "public key is {} bytes, expected {P256_SPKI_LEN}",
            der.len()
        )));
    }
    let (prefix, point) = der.split_at(P256_SPKI_PREFIX.len());
    if prefix != P256_SPKI_PREFIX.as_slice() || point[0] != 0x04 {
        return Err(CeremonyError::UnsupportedAlgorithm(
            "stored key is not an uncompressed P-256 key".to_string(),
        ));
    }
    Ok(point)
}

/// Render a P-256 SubjectPublicKeyInfo document as PEM
///
/// # Errors
/// Returns `MalformedInput` if `der` is not a valid P-256 public key.
pub fn spki_der_to_pem(der: &[u8]) -> CeremonyResult<String> {
    let key = p256::PublicKey::from_public_key_der(der)
        .map_err(|e| CeremonyError::MalformedInput(format!("public key DER: {e}")))?;
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|e| CeremonyError::MalformedInput(format!("public key PEM: {e}")))
}
