//! CBOR processing for `WebAuthn`
//!
//! This module handles the CBOR (Concise Binary Object Representation)
//! decoding needed for attestation objects and COSE keys. All label-shape
//! tolerance lives here: a map may key its entries by CBOR integers, by text,
//! or by integers spelled as text (`"-2"`), and [`map_lookup`] treats those
//! uniformly so callers never branch on representation.

use std::io::Cursor;

use ciborium::de::from_reader;
use ciborium::value::Value;
use log::debug;

use super::errors::CeremonyError;

/// A map label as used by COSE (integers) or the attestation object (text)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label<'a> {
    Int(i64),
    Text(&'a str),
}

/// Decoded attestation object
///
/// Only `authData` matters for verification; `fmt` is kept for logging since
/// attestation statements are accepted as self-attested ("none").
#[derive(Debug, Clone)]
pub struct AttestationObject {
    pub fmt: Option<String>,
    pub auth_data: Vec<u8>,
}

/// Decode a single CBOR item that must span the whole buffer
///
/// # Errors
/// Returns `MalformedInput` on truncated, invalid, or trailing data.
pub fn decode(bytes: &[u8]) -> Result<Value, CeremonyError> {
    let (value, consumed) = decode_prefix(bytes)?;
    if consumed != bytes.len() {
        return Err(CeremonyError::MalformedInput(format!(
            "{} trailing bytes after CBOR item",
            bytes.len() - consumed
        )));
    }
    Ok(value)
}

/// Decode the first CBOR item in the buffer and report how many bytes it used
///
/// # Errors
/// Returns `MalformedInput` if no complete item can be decoded.
pub fn decode_prefix(bytes: &[u8]) -> Result<(Value, usize), CeremonyError> {
    let mut cursor = Cursor::new(bytes);
    let value: Value = from_reader(&mut cursor)
        .map_err(|e| CeremonyError::MalformedInput(format!("invalid CBOR: {e:?}")))?;
    let consumed = usize::try_from(cursor.position())
        .map_err(|_| CeremonyError::MalformedInput("CBOR item too large".to_string()))?;
    Ok((value, consumed))
}

/// Look up a map entry by label, tolerating integer labels spelled as text
#[must_use]
pub fn map_lookup<'v>(value: &'v Value, label: Label<'_>) -> Option<&'v Value> {
    let Value::Map(entries) = value else {
        return None;
    };
    entries
        .iter()
        .find(|(key, _)| label_matches(key, label))
        .map(|(_, v)| v)
}

/// Look up a byte-string entry
#[must_use]
pub fn map_bytes<'v>(value: &'v Value, label: Label<'_>) -> Option<&'v [u8]> {
    map_lookup(value, label).and_then(|v| v.as_bytes().map(Vec::as_slice))
}

/// Look up an integer entry that fits in an `i64`
///
/// Text-encoded integers are accepted for the same reason labels are.
#[must_use]
pub fn map_int(value: &Value, label: Label<'_>) -> Option<i64> {
    match map_lookup(value, label)? {
        Value::Integer(i) => i64::try_from(*i).ok(),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn label_matches(key: &Value, label: Label<'_>) -> bool {
    match (key, label) {
        (Value::Integer(i), Label::Int(n)) => i128::from(*i) == i128::from(n),
        (Value::Text(s), Label::Int(n)) => s.trim().parse::<i64>() == Ok(n),
        (Value::Text(s), Label::Text(t)) => s == t,
        _ => false,
    }
}

/// Decode an attestation object and pull out `authData`
///
/// # Errors
/// Returns `MalformedInput` if the object is not a CBOR map or has no
/// byte-string `authData` entry.
pub fn parse_attestation_object(bytes: &[u8]) -> Result<AttestationObject, CeremonyError> {
    let attestation = decode(bytes)?;
    if !attestation.is_map() {
        return Err(CeremonyError::MalformedInput(
            "attestation object is not a map".to_string(),
        ));
    }

    let auth_data = map_bytes(&attestation, Label::Text("authData"))
        .ok_or_else(|| {
            CeremonyError::MalformedInput("missing authData in attestation".to_string())
        })?
        .to_vec();

    let fmt = map_lookup(&attestation, Label::Text("fmt"))
        .and_then(Value::as_text)
        .map(ToString::to_string);
    debug!(
        "Attestation object decoded: fmt={:?}, authData {} bytes",
        fmt,
        auth_data.len()
    );

    Ok(AttestationObject { fmt, auth_data })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_cbor(value: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(value, &mut out).unwrap();
        out
    }

    #[test]
    fn test_decode_prefix_reports_consumed_length() {
        let item = to_cbor(&Value::Map(vec![(
            Value::Integer(1.into()),
            Value::Integer(2.into()),
        )]));
        let mut buf = item.clone();
        buf.extend_from_slice(&[0xa0, 0xff]);

        let (value, consumed) = decode_prefix(&buf).unwrap();
        assert_eq!(consumed, item.len());
        assert_eq!(map_int(&value, Label::Int(1)), Some(2));
    }

    #[test]
    fn test_decode_rejects_trailing_and_truncated() {
        let mut buf = to_cbor(&Value::Bytes(vec![1, 2, 3]));
        assert!(decode(&buf).is_ok());

        buf.push(0x00);
        assert!(matches!(decode(&buf), Err(CeremonyError::MalformedInput(_))));

        let truncated = &to_cbor(&Value::Bytes(vec![0; 40]))[..10];
        assert!(matches!(
            decode(truncated),
            Err(CeremonyError::MalformedInput(_))
        ));
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn test_map_lookup_normalizes_label_shapes() {
        let map = Value::Map(vec![
            (Value::Integer((-2).into()), Value::Bytes(vec![0xaa])),
            (Value::Text("-3".to_string()), Value::Bytes(vec![0xbb])),
            (Value::Text("fmt".to_string()), Value::Text("none".to_string())),
        ]);

        assert_eq!(map_bytes(&map, Label::Int(-2)), Some(&[0xaa][..]));
        assert_eq!(map_bytes(&map, Label::Int(-3)), Some(&[0xbb][..]));
        assert!(map_lookup(&map, Label::Text("fmt")).is_some());
        assert!(map_lookup(&map, Label::Int(3)).is_none());
        assert!(map_lookup(&Value::Bytes(vec![]), Label::Int(1)).is_none());
    }

    #[test]
    fn test_parse_attestation_object() {
        let object = Value::Map(vec![
            (Value::Text("fmt".to_string()), Value::Text("none".to_string())),
            (Value::Text("attStmt".to_string()), Value::Map(vec![])),
            (Value::Text("authData".to_string()), Value::Bytes(vec![7; 37])),
        ]);
        let parsed = parse_attestation_object(&to_cbor(&object)).unwrap();
        assert_eq!(parsed.fmt.as_deref(), Some("none"));
        assert_eq!(parsed.auth_data, vec![7; 37]);
    }

    #[test]
    fn test_parse_attestation_object_requires_auth_data_bytes() {
        let missing = Value::Map(vec![(
            Value::Text("fmt".to_string()),
            Value::Text("none".to_string()),
        )]);
        assert!(matches!(
            parse_attestation_object(&to_cbor(&missing)),
            Err(CeremonyError::MalformedInput(_))
        ));

        let wrong_type = Value::Map(vec![(
            Value::Text("authData".to_string()),
            Value::Text("not bytes".to_string()),
        )]);
        assert!(parse_attestation_object(&to_cbor(&wrong_type)).is_err());

        let not_map = Value::Array(vec![]);
        assert!(parse_attestation_object(&to_cbor(&not_map)).is_err());
    }
}
