use crate::encoding;
use crate::error::{Error, Result};
use crate::suite;
use bip39::Mnemonic;
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

/// scrypt salt for the identity pipeline.
pub const SCRYPT_SALT: &[u8] = b"nzcore-identity-v1";

/// HKDF extract salt.
pub const HKDF_SALT: &[u8] = b"nzcore-hkdf-salt";

/// HKDF info string for the Ed25519 root key.
pub const HKDF_INFO_ROOT_KEY: &[u8] = b"ed25519-root-key";

// scrypt N=32768 (2^15), r=8, p=1, dkLen=64.
const SCRYPT_LOG_N: u8 = 15;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;
const SCRYPT_DK_LEN: usize = 64;

/// The identity root: Ed25519 keypair plus the chain id derived from the
/// public half. Immutable after derivation; the private half is wiped
/// exactly once, by [`RootIdentity::wipe`] or on drop.
#[derive(Debug)]
pub struct RootIdentity {
    public_key: [u8; suite::PUBLIC_KEY_LENGTH],
    private_key: [u8; suite::PRIVATE_KEY_LENGTH],
    chain_id: String,
}

impl RootIdentity {
    pub fn public_key(&self) -> &[u8; suite::PUBLIC_KEY_LENGTH] {
        &self.public_key
    }

    pub fn public_key_hex(&self) -> String {
        encoding::encode_hex(&self.public_key)
    }

    /// Chain id: lowercase hex of the domain-separated hash of the
    /// public key. A pure function of the public key.
    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Sign `message` with the root private key.
    pub fn sign(&self, message: &[u8]) -> Result<[u8; suite::SIGNATURE_LENGTH]> {
        suite::sign(&self.private_key, message)
    }

    /// Wipe the private key in place: multi-pass fill plus a re-check.
    /// Returns false if any byte survived the wipe.
    pub fn wipe(&mut self) -> bool {
        crate::security::wipe(&mut self.private_key)
    }
}

impl Drop for RootIdentity {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

/// Combined HKDF-SHA256 extract-and-expand. The intermediate PRK is
/// zeroized before this returns.
pub fn hkdf_derive(ikm: &[u8], salt: &[u8], info: &[u8], length: usize) -> Result<Zeroizing<Vec<u8>>> {
    let (mut prk, hk) = Hkdf::<Sha256>::extract(Some(salt), ikm);
    let mut okm = Zeroizing::new(vec![0u8; length]);
    let expanded = hk.expand(info, okm.as_mut());
    prk.as_mut_slice().zeroize();
    expanded.map_err(|e| Error::InvalidKey(format!("hkdf expand: {e}")))?;
    Ok(okm)
}

/// Memory-hard stretch of the BIP-39 seed.
fn scrypt_stretch(seed: &[u8]) -> Result<Zeroizing<[u8; SCRYPT_DK_LEN]>> {
    let params = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, SCRYPT_DK_LEN)
        .map_err(|e| Error::InvalidKey(format!("scrypt params: {e}")))?;
    let mut out = Zeroizing::new([0u8; SCRYPT_DK_LEN]);
    scrypt::scrypt(seed, SCRYPT_SALT, &params, out.as_mut())
        .map_err(|e| Error::InvalidKey(format!("scrypt: {e}")))?;
    Ok(out)
}

/// Deterministic identity pipeline, mnemonic-only input:
/// seed (empty passphrase) -> scrypt -> HKDF-SHA256 -> Ed25519 keypair
/// -> chain id. Each intermediate is zeroized before return.
pub fn derive_identity(mnemonic: &Mnemonic) -> Result<RootIdentity> {
    let seed = crate::mnemonic::to_seed(mnemonic);
    let scrypt_key = scrypt_stretch(seed.as_ref())?;
    let derived = hkdf_derive(
        scrypt_key.as_ref(),
        HKDF_SALT,
        HKDF_INFO_ROOT_KEY,
        suite::PRIVATE_KEY_LENGTH,
    )?;

    let mut ed_seed = Zeroizing::new([0u8; suite::PRIVATE_KEY_LENGTH]);
    ed_seed.copy_from_slice(&derived);
    let (public_key, private_key) = suite::keypair_from_seed(&ed_seed);

    let chain_id = encoding::encode_hex(&suite::domain_hash(suite::CHAIN_ID_DOMAIN, &public_key));

    Ok(RootIdentity {
        public_key,
        private_key,
        chain_id,
    })
}

/// Deterministic document id:
/// `hex(domain_hash(document-domain, chain_id || parent_hash || u32_le(t)))`.
///
/// Logical time is pinned to a 32-bit little-endian encoding here, which
/// bounds id derivation at `u32::MAX` even though the clock itself ranges
/// higher.
pub fn derive_document_id(chain_id: &str, parent_hash: &str, logical_time: u64) -> Result<String> {
    if logical_time == 0 {
        return Err(Error::LogicalTimeViolation(
            "logical time must be at least 1".into(),
        ));
    }
    if logical_time > u32::MAX as u64 {
        return Err(Error::LogicalTimeViolation(format!(
            "logical time {logical_time} exceeds the id-derivation bound of {}",
            u32::MAX
        )));
    }
    let chain_bytes = encoding::decode_hex_exact(chain_id, suite::HASH_LENGTH)?;
    let parent_bytes = encoding::decode_hex_exact(parent_hash, suite::HASH_LENGTH)?;
    let time_bytes = (logical_time as u32).to_le_bytes();
    let data = encoding::merge(&[&chain_bytes, &parent_bytes, &time_bytes]);
    Ok(encoding::encode_hex(&suite::domain_hash(
        suite::DOCUMENT_ID_DOMAIN,
        &data,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::GENESIS_HASH;

    const VECTOR: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn vector_identity() -> RootIdentity {
        derive_identity(&crate::mnemonic::parse(VECTOR).unwrap()).unwrap()
    }

    #[test]
    fn identity_is_deterministic() {
        let a = vector_identity();
        let b = vector_identity();
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.chain_id(), b.chain_id());
        assert_eq!(a.chain_id().len(), 64);
        assert!(crate::encoding::is_hex64(a.chain_id()));
    }

    #[test]
    fn chain_id_is_pure_function_of_public_key() {
        let identity = vector_identity();
        let recomputed = encoding::encode_hex(&suite::domain_hash(
            suite::CHAIN_ID_DOMAIN,
            identity.public_key(),
        ));
        assert_eq!(identity.chain_id(), recomputed);
    }

    #[test]
    fn document_id_is_pure_and_time_sensitive() {
        let chain_id = "11".repeat(32);
        let a = derive_document_id(&chain_id, GENESIS_HASH, 1).unwrap();
        let b = derive_document_id(&chain_id, GENESIS_HASH, 1).unwrap();
        let c = derive_document_id(&chain_id, GENESIS_HASH, 2).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(crate::encoding::is_hex64(&a));
    }

    #[test]
    fn document_id_bounds() {
        let chain_id = "11".repeat(32);
        assert!(derive_document_id(&chain_id, GENESIS_HASH, 0).is_err());
        assert!(derive_document_id(&chain_id, GENESIS_HASH, u32::MAX as u64).is_ok());
        let err = derive_document_id(&chain_id, GENESIS_HASH, u32::MAX as u64 + 1).unwrap_err();
        assert_eq!(err.code(), "LogicalTimeViolation");
    }

    #[test]
    fn wipe_zeroes_private_key() {
        let mut identity = vector_identity();
        assert!(identity.wipe());
        assert!(identity.private_key.iter().all(|&b| b == 0));
        // Signing with a wiped key still "works" mechanically but with a
        // zero key, so the public half no longer matches.
        let sig = identity.sign(b"m").unwrap();
        assert!(!suite::verify(identity.public_key(), b"m", &sig).unwrap());
    }

    #[test]
    fn hkdf_is_deterministic_and_length_exact() {
        let a = hkdf_derive(b"ikm", b"salt", b"info", 32).unwrap();
        let b = hkdf_derive(b"ikm", b"salt", b"info", 32).unwrap();
        assert_eq!(a.as_slice(), b.as_slice());
        assert_eq!(a.len(), 32);
        let c = hkdf_derive(b"ikm", b"other", b"info", 32).unwrap();
        assert_ne!(a.as_slice(), c.as_slice());
    }
}
