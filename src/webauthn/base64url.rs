//! Base64URL encoding for `WebAuthn` payloads
//!
//! Byte buffers travel between client and server as unpadded base64url text.
//! Browsers are not consistent about padding, so the decoder accepts both forms.

use base64::alphabet;
use base64::engine::general_purpose::GeneralPurpose;
use base64::engine::{DecodePaddingMode, GeneralPurposeConfig};
use base64::Engine;

use super::errors::CeremonyError;

/// URL-safe alphabet, never pads on encode, tolerates padding on decode
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes as unpadded base64url
#[must_use]
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_LENIENT.encode(bytes)
}

/// Decode base64url text, padded or not
///
/// # Errors
/// Returns `MalformedInput` if the text contains characters outside the
/// URL-safe alphabet or has an impossible length.
pub fn decode(text: &str) -> Result<Vec<u8>, CeremonyError> {
    URL_SAFE_LENIENT
        .decode(text)
        .map_err(|e| CeremonyError::MalformedInput(format!("invalid base64url: {e}")))
}

/// Decode a named base64url field, tagging the error with the field name
pub(crate) fn decode_field(field: &str, text: &str) -> Result<Vec<u8>, CeremonyError> {
    URL_SAFE_LENIENT
        .decode(text)
        .map_err(|e| CeremonyError::MalformedInput(format!("invalid base64url in {field}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_strips_padding_and_uses_url_alphabet() {
        assert_eq!(encode([0xfb_u8, 0xff]), "-_8");
        assert_eq!(encode(b"f"), "Zg");
        assert_eq!(encode(b""), "");
    }

    #[test]
    fn test_roundtrip_all_lengths() {
        let data: Vec<u8> = (0..=255).collect();
        for len in 0..40 {
            let slice = &data[..len];
            assert_eq!(decode(&encode(slice)).unwrap(), slice);
        }
    }

    #[test]
    fn test_decode_accepts_padding() {
        assert_eq!(decode("Zg==").unwrap(), b"f");
        assert_eq!(decode("Zg").unwrap(), b"f");
        assert_eq!(decode("Zm8=").unwrap(), b"fo");
    }

    #[test]
    fn test_decode_rejects_standard_alphabet() {
        assert!(matches!(
            decode("+/8"),
            Err(CeremonyError::MalformedInput(_))
        ));
        assert!(matches!(
            decode("ab!c"),
            Err(CeremonyError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_decode_field_names_the_field() {
        let err = decode_field("signature", "***").unwrap_err();
        assert!(err.to_string().contains("signature"));
    }
}
