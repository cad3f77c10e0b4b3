//! Authenticator data parsing
//!
//! Layout:
//! - 32 bytes: RP ID hash
//! - 1 byte: flags
//! - 4 bytes: signature counter (big-endian)
//! - variable: attested credential data (only if the AT flag is set)
//!   - 16 bytes: AAGUID
//!   - 2 bytes: credential ID length (L, big-endian)
//!   - L bytes: credential ID
//!   - variable: COSE public key
//! - variable: extensions (only if the ED flag is set)
//!
//! Every length is checked before the bytes it covers are read. A truncated
//! buffer is always rejected as a whole.

use ciborium::value::Value;
use log::debug;

use super::cbor;
use super::errors::CeremonyError;

const RP_ID_HASH_LEN: usize = 32;
const FLAGS_OFFSET: usize = 32;
const COUNTER_OFFSET: usize = 33;
const AAGUID_OFFSET: usize = 37;
const CRED_ID_LEN_OFFSET: usize = 53;
const CRED_ID_OFFSET: usize = 55;

/// Minimum length of any authenticator data buffer
pub const MIN_AUTH_DATA_LEN: usize = AAGUID_OFFSET;

/// Authenticator data flag bits
pub mod flags {
    pub const USER_PRESENT: u8 = 0x01;
    pub const USER_VERIFIED: u8 = 0x04;
    pub const ATTESTED_CREDENTIAL_DATA: u8 = 0x40;
    pub const EXTENSION_DATA: u8 = 0x80;
}

/// Credential block present in registration authenticator data
#[derive(Debug, Clone)]
pub struct AttestedCredentialData {
    pub aaguid: [u8; 16],
    pub credential_id: Vec<u8>,
    /// Raw CBOR bytes of the COSE key, exactly as the authenticator sent them
    pub public_key_bytes: Vec<u8>,
    /// The same key, decoded
    pub public_key: Value,
}

/// Parsed authenticator data
#[derive(Debug, Clone)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: u8,
    pub sign_count: u32,
    pub attested_credential: Option<AttestedCredentialData>,
    pub extensions: Option<Vec<u8>>,
}

impl AuthenticatorData {
    /// Parse authenticator data from raw bytes
    ///
    /// # Errors
    /// Returns `MalformedInput` if any section is shorter than its declared or
    /// fixed size, if the COSE key cannot be decoded, or if bytes are left over
    /// without the extension flag.
    pub fn parse(bytes: &[u8]) -> Result<Self, CeremonyError> {
        if bytes.len() < MIN_AUTH_DATA_LEN {
            return Err(too_short("header", MIN_AUTH_DATA_LEN, bytes.len()));
        }

        let mut rp_id_hash = [0u8; RP_ID_HASH_LEN];
        rp_id_hash.copy_from_slice(&bytes[..RP_ID_HASH_LEN]);
        let flags = bytes[FLAGS_OFFSET];
        let sign_count = u32::from_be_bytes([
            bytes[COUNTER_OFFSET],
            bytes[COUNTER_OFFSET + 1],
            bytes[COUNTER_OFFSET + 2],
            bytes[COUNTER_OFFSET + 3],
        ]);

        let mut pos = AAGUID_OFFSET;
        let attested_credential = if flags & flags::ATTESTED_CREDENTIAL_DATA == 0 {
            None
        } else {
            let (data, end) = parse_attested_credential(bytes)?;
            pos = end;
            Some(data)
        };

        let rest = &bytes[pos..];
        let extensions = if flags & flags::EXTENSION_DATA == 0 {
            if !rest.is_empty() {
                return Err(CeremonyError::MalformedInput(format!(
                    "{} unexpected trailing bytes in authenticator data",
                    rest.len()
                )));
            }
            None
        } else {
            if rest.is_empty() {
                return Err(CeremonyError::MalformedInput(
                    "extension flag set without extension data".to_string(),
                ));
            }
            Some(rest.to_vec())
        };

        debug!(
            "Authenticator data parsed: flags={flags:#04x}, sign_count={sign_count}, attested={}",
            attested_credential.is_some()
        );

        Ok(Self {
            rp_id_hash,
            flags,
            sign_count,
            attested_credential,
            extensions,
        })
    }

    #[must_use]
    pub fn user_present(&self) -> bool {
        self.flags & flags::USER_PRESENT != 0
    }

    #[must_use]
    pub fn user_verified(&self) -> bool {
        self.flags & flags::USER_VERIFIED != 0
    }

    #[must_use]
    pub fn has_attested_credential_data(&self) -> bool {
        self.flags & flags::ATTESTED_CREDENTIAL_DATA != 0
    }

    #[must_use]
    pub fn has_extension_data(&self) -> bool {
        self.flags & flags::EXTENSION_DATA != 0
    }

    /// Require the UP flag, and the UV flag when `require_verification` is set
    ///
    /// # Errors
    /// Returns `UserPresenceMissing` or `UserVerificationMissing`.
    pub fn require_user_flags(&self, require_verification: bool) -> Result<(), CeremonyError> {
        if !self.user_present() {
            return Err(CeremonyError::UserPresenceMissing);
        }
        if require_verification && !self.user_verified() {
            return Err(CeremonyError::UserVerificationMissing);
        }
        Ok(())
    }
}

/// Parse the attested credential block; returns it with the offset just past the key
fn parse_attested_credential(
    bytes: &[u8],
) -> Result<(AttestedCredentialData, usize), CeremonyError> {
    if bytes.len() < CRED_ID_OFFSET {
        return Err(too_short(
            "credential ID length",
            CRED_ID_OFFSET,
            bytes.len(),
        ));
    }

    let mut aaguid = [0u8; 16];
    aaguid.copy_from_slice(&bytes[AAGUID_OFFSET..CRED_ID_LEN_OFFSET]);

    let id_len = usize::from(u16::from_be_bytes([
        bytes[CRED_ID_LEN_OFFSET],
        bytes[CRED_ID_LEN_OFFSET + 1],
    ]));
    let key_offset = CRED_ID_OFFSET + id_len;
    if bytes.len() < key_offset {
        return Err(too_short("credential ID", key_offset, bytes.len()));
    }
    let credential_id = bytes[CRED_ID_OFFSET..key_offset].to_vec();

    if bytes.len() == key_offset {
        return Err(CeremonyError::MalformedInput(
            "auth data too short for public key".to_string(),
        ));
    }
    let (public_key, key_len) = cbor::decode_prefix(&bytes[key_offset..])?;
    let key_end = key_offset + key_len;

    Ok((
        AttestedCredentialData {
            aaguid,
            credential_id,
            public_key_bytes: bytes[key_offset..key_end].to_vec(),
            public_key,
        },
        key_end,
    ))
}

fn too_short(section: &str, needed: usize, actual: usize) -> CeremonyError {
    CeremonyError::MalformedInput(format!(
        "auth data too short for {section}: need {needed} bytes, have {actual}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cose_key_bytes() -> Vec<u8> {
        let key = Value::Map(vec![
            (Value::Integer(1.into()), Value::Integer(2.into())),
            (Value::Integer(3.into()), Value::Integer((-7).into())),
            (Value::Integer((-1).into()), Value::Integer(1.into())),
            (Value::Integer((-2).into()), Value::Bytes(vec![0x11; 32])),
            (Value::Integer((-3).into()), Value::Bytes(vec![0x22; 32])),
        ]);
        let mut out = Vec::new();
        ciborium::ser::into_writer(&key, &mut out).unwrap();
        out
    }

    fn header(flags: u8, counter: u32) -> Vec<u8> {
        let mut buf = vec![0xab; 32];
        buf.push(flags);
        buf.extend_from_slice(&counter.to_be_bytes());
        buf
    }

    fn attested(cred_id: &[u8], key: &[u8]) -> Vec<u8> {
        let mut buf = header(flags::USER_PRESENT | flags::ATTESTED_CREDENTIAL_DATA, 9);
        buf.extend_from_slice(&[0x5a; 16]);
        buf.extend_from_slice(&u16::try_from(cred_id.len()).unwrap().to_be_bytes());
        buf.extend_from_slice(cred_id);
        buf.extend_from_slice(key);
        buf
    }

    #[test]
    fn test_parse_assertion_header() {
        let data = AuthenticatorData::parse(&header(flags::USER_PRESENT, 0x0102_0304)).unwrap();
        assert_eq!(data.rp_id_hash, [0xab; 32]);
        assert_eq!(data.sign_count, 0x0102_0304);
        assert!(data.user_present());
        assert!(!data.user_verified());
        assert!(data.attested_credential.is_none());
        assert!(data.extensions.is_none());
    }

    #[test]
    fn test_require_user_flags() {
        let absent = AuthenticatorData::parse(&header(0, 0)).unwrap();
        assert_eq!(
            absent.require_user_flags(false),
            Err(CeremonyError::UserPresenceMissing)
        );

        let present = AuthenticatorData::parse(&header(flags::USER_PRESENT, 0)).unwrap();
        assert!(present.require_user_flags(false).is_ok());
        assert_eq!(
            present.require_user_flags(true),
            Err(CeremonyError::UserVerificationMissing)
        );

        let verified =
            AuthenticatorData::parse(&header(flags::USER_PRESENT | flags::USER_VERIFIED, 0))
                .unwrap();
        assert!(verified.require_user_flags(true).is_ok());
    }

    #[test]
    fn test_parse_attested_credential_recovers_fields() {
        let key = cose_key_bytes();
        let cred_id = b"credential-0001".to_vec();
        let data = AuthenticatorData::parse(&attested(&cred_id, &key)).unwrap();

        assert_eq!(data.rp_id_hash, [0xab; 32]);
        assert_eq!(data.sign_count, 9);
        assert!(data.has_attested_credential_data());
        let block = data.attested_credential.unwrap();
        assert_eq!(block.aaguid, [0x5a; 16]);
        assert_eq!(block.credential_id, cred_id);
        assert_eq!(block.public_key_bytes, key);
        assert!(block.public_key.is_map());
    }

    #[test]
    fn test_short_buffers_are_rejected() {
        for len in 0..MIN_AUTH_DATA_LEN {
            assert!(matches!(
                AuthenticatorData::parse(&vec![0u8; len]),
                Err(CeremonyError::MalformedInput(_))
            ));
        }
    }

    #[test]
    fn test_exactly_37_bytes_with_attested_flag_fails() {
        let buf = header(flags::ATTESTED_CREDENTIAL_DATA, 0);
        assert_eq!(buf.len(), 37);
        assert!(matches!(
            AuthenticatorData::parse(&buf),
            Err(CeremonyError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_truncated_credential_id_and_key_fail() {
        let key = cose_key_bytes();
        let full = attested(b"abcdef", &key);

        // Cut inside the credential ID
        assert!(AuthenticatorData::parse(&full[..CRED_ID_OFFSET + 3]).is_err());
        // Credential ID present but no key at all
        assert!(AuthenticatorData::parse(&full[..CRED_ID_OFFSET + 6]).is_err());
        // Key cut short
        assert!(AuthenticatorData::parse(&full[..full.len() - 1]).is_err());
    }

    #[test]
    fn test_trailing_bytes_need_extension_flag() {
        let mut buf = header(flags::USER_PRESENT, 1);
        buf.push(0xa0);
        assert!(AuthenticatorData::parse(&buf).is_err());

        buf[FLAGS_OFFSET] |= flags::EXTENSION_DATA;
        let data = AuthenticatorData::parse(&buf).unwrap();
        assert!(data.has_extension_data());
        assert_eq!(data.extensions, Some(vec![0xa0]));
    }

    #[test]
    fn test_extensions_after_attested_key() {
        let key = cose_key_bytes();
        let mut buf = attested(b"id", &key);
        buf[FLAGS_OFFSET] |= flags::EXTENSION_DATA;
        buf.extend_from_slice(&[0xa1, 0x01, 0x02]);

        let data = AuthenticatorData::parse(&buf).unwrap();
        assert_eq!(data.attested_credential.unwrap().public_key_bytes, key);
        assert_eq!(data.extensions, Some(vec![0xa1, 0x01, 0x02]));
    }
}
