use crate::error::{Error, Result};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};

/// BLAKE2b with a 32-byte output.
type Blake2b256 = Blake2b<U32>;

/// The pinned cryptographic suite. Every algorithm choice below is fixed
/// under this identifier; a document declaring anything else is rejected.
pub const CRYPTO_SUITE: &str = "nzcore-crypto-01";

/// Domain string for chain-id derivation.
pub const CHAIN_ID_DOMAIN: &str = "nzcore-nzcore-crypto-01-chain";

/// Domain string for document-id derivation.
pub const DOCUMENT_ID_DOMAIN: &str = "nzcore-nzcore-crypto-01-document";

pub const HASH_LENGTH: usize = 32;
pub const PUBLIC_KEY_LENGTH: usize = 32;
pub const PRIVATE_KEY_LENGTH: usize = 32;
pub const SIGNATURE_LENGTH: usize = 64;

/// BLAKE2b-256 over raw bytes.
pub fn hash(data: &[u8]) -> [u8; HASH_LENGTH] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Domain-separated hash: `H(domain || ":" || data)`.
///
/// The ASCII domain prefix keeps hashes computed for different purposes
/// from ever colliding with each other.
pub fn domain_hash(domain: &str, data: &[u8]) -> [u8; HASH_LENGTH] {
    let mut hasher = Blake2b256::new();
    hasher.update(domain.as_bytes());
    hasher.update(b":");
    hasher.update(data);
    hasher.finalize().into()
}

/// `H(H(data))`.
pub fn double_hash(data: &[u8]) -> [u8; HASH_LENGTH] {
    hash(&hash(data))
}

/// Ed25519 keypair from a 32-byte seed. Returns `(public, private)`.
pub fn keypair_from_seed(seed: &[u8; 32]) -> ([u8; PUBLIC_KEY_LENGTH], [u8; PRIVATE_KEY_LENGTH]) {
    let signing = SigningKey::from_bytes(seed);
    (signing.verifying_key().to_bytes(), signing.to_bytes())
}

/// Pure Ed25519 detached signature over `message`.
pub fn sign(private_key: &[u8; PRIVATE_KEY_LENGTH], message: &[u8]) -> Result<[u8; SIGNATURE_LENGTH]> {
    let key = SigningKey::from_bytes(private_key);
    Ok(key.sign(message).to_bytes())
}

/// Verify a detached Ed25519 signature. Key and signature length problems
/// are errors; an honest mismatch is `Ok(false)`.
pub fn verify(public_key: &[u8; PUBLIC_KEY_LENGTH], message: &[u8], signature: &[u8]) -> Result<bool> {
    let key = VerifyingKey::from_bytes(public_key)
        .map_err(|e| Error::InvalidKey(format!("ed25519 public key: {e}")))?;
    if signature.len() != SIGNATURE_LENGTH {
        return Err(Error::InvalidSignature(format!(
            "expected {SIGNATURE_LENGTH}-byte signature, got {}",
            signature.len()
        )));
    }
    let sig = Signature::from_slice(signature)
        .map_err(|e| Error::InvalidSignature(format!("ed25519 signature: {e}")))?;
    Ok(key.verify_strict(message, &sig).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_domain_separated() {
        let a = hash(b"nzcore");
        assert_eq!(a, hash(b"nzcore"));
        assert_ne!(a, domain_hash("x", b"nzcore"));
        assert_ne!(domain_hash("x", b"nzcore"), domain_hash("y", b"nzcore"));
        assert_ne!(a, double_hash(b"nzcore"));
    }

    #[test]
    fn domain_prefix_is_not_ambiguous() {
        // "ab" + ":" + "c" must differ from "a" + ":" + "bc".
        assert_ne!(domain_hash("ab", b"c"), domain_hash("a", b"bc"));
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let seed = [7u8; 32];
        let (public, private) = keypair_from_seed(&seed);
        let sig = sign(&private, b"payload").unwrap();
        assert_eq!(sig.len(), SIGNATURE_LENGTH);
        assert!(verify(&public, b"payload", &sig).unwrap());
        assert!(!verify(&public, b"tampered", &sig).unwrap());
    }

    #[test]
    fn verify_rejects_bad_lengths() {
        let seed = [9u8; 32];
        let (public, _) = keypair_from_seed(&seed);
        let err = verify(&public, b"m", &[0u8; 63]).unwrap_err();
        assert_eq!(err.code(), "InvalidSignature");
    }
}
