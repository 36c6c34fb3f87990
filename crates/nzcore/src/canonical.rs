//! RFC 8785 (JCS) canonicalization for signing and equality.
//!
//! Verification rejects any encoding variance before the signature check;
//! otherwise semantically equal but textually distinct forms would carry
//! different signatures.

use crate::error::{Error, Result};
use crate::security;
use serde_json::Value;

/// Serialize a value into its canonical form: keys sorted on UTF-16 code
/// units, no insignificant whitespace, shortest-form numbers, minimal
/// string escapes.
pub fn serialize(value: &Value) -> Result<String> {
    serde_jcs::to_string(value).map_err(|e| Error::NonCanonicalJson(format!("serialize: {e}")))
}

/// Assert that `input` already is the canonical encoding of the value it
/// parses to. The comparison against the re-serialized form never
/// short-circuits on the first mismatching byte.
pub fn assert_canonical(input: &str) -> Result<()> {
    let value: Value = serde_json::from_str(input)
        .map_err(|e| Error::NonCanonicalJson(format!("parse: {e}")))?;
    let reserialized = serialize(&value)?;
    if !security::constant_time_str_eq(input, &reserialized) {
        return Err(Error::NonCanonicalJson(
            "input differs from its canonical form".into(),
        ));
    }
    Ok(())
}

/// Canonical serialization of a document with its `signature` field
/// removed. This is the exact byte sequence signatures cover.
pub fn prepare_for_signing(document: &Value) -> Result<String> {
    match document {
        Value::Object(map) => {
            let mut unsigned = map.clone();
            unsigned.remove("signature");
            serialize(&Value::Object(unsigned))
        }
        _ => Err(Error::NonCanonicalJson(
            "document must be a json object".into(),
        )),
    }
}

/// Constant-time equality over canonical forms.
pub fn canonical_equal(a: &Value, b: &Value) -> Result<bool> {
    let ca = serialize(a)?;
    let cb = serialize(b)?;
    Ok(security::constant_time_str_eq(&ca, &cb))
}
