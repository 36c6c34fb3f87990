use crate::error::{Error, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

/// Lowercase hex encoding.
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Hex decoding; accepts what `hex` accepts, rejects odd lengths and
/// non-hex characters.
pub fn decode_hex(input: &str) -> Result<Vec<u8>> {
    hex::decode(input).map_err(|e| Error::InvalidKey(format!("hex decode: {e}")))
}

/// Hex decoding with an exact output length requirement.
pub fn decode_hex_exact(input: &str, expected_len: usize) -> Result<Vec<u8>> {
    let bytes = decode_hex(input)?;
    if bytes.len() != expected_len {
        return Err(Error::InvalidKey(format!(
            "expected {expected_len} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// True iff the input is exactly 64 lowercase hex characters.
pub fn is_hex64(input: &str) -> bool {
    input.len() == 64
        && input
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Unpadded Base64URL encoding.
pub fn encode_base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Unpadded Base64URL decoding.
pub fn decode_base64url(input: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(input)
        .map_err(|e| Error::InvalidKey(format!("base64url decode: {e}")))
}

/// Concatenate byte slices into one owned buffer.
pub fn merge(parts: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(parts.iter().map(|p| p.len()).sum());
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}
