use crate::error::{Error, Result};
use bip39::{Language, Mnemonic};
use zeroize::{Zeroize, Zeroizing};

/// Entropy size for generated phrases: 256 bits, 24 words.
pub const GENERATED_ENTROPY_BYTES: usize = 32;

/// Placeholder character used by [`mask`].
pub const MASK_PLACEHOLDER: char = '\u{2022}';

/// Generate a fresh 24-word English mnemonic from OS entropy.
pub fn generate() -> Result<Mnemonic> {
    let mut entropy = Zeroizing::new([0u8; GENERATED_ENTROPY_BYTES]);
    crate::security::secure_random(entropy.as_mut());
    Mnemonic::from_entropy_in(Language::English, entropy.as_ref())
        .map_err(|e| Error::InvalidMnemonic(format!("entropy encoding: {e}")))
}

/// Parse and checksum-validate an English phrase.
pub fn parse(phrase: &str) -> Result<Mnemonic> {
    Mnemonic::parse_in_normalized(Language::English, phrase)
        .map_err(|e| Error::InvalidMnemonic(e.to_string()))
}

/// Checksum validation without keeping the parsed phrase around.
pub fn validate(phrase: &str) -> Result<()> {
    parse(phrase).map(|_| ())
}

/// The 64-byte BIP-39 seed with the empty passphrase.
///
/// The empty passphrase is mandatory here: any other value derives a
/// different identity from the same phrase.
pub fn to_seed(mnemonic: &Mnemonic) -> Zeroizing<[u8; 64]> {
    Zeroizing::new(mnemonic.to_seed(""))
}

/// Recover the raw entropy the phrase encodes.
pub fn to_entropy(mnemonic: &Mnemonic) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(mnemonic.to_entropy())
}

/// Rebuild a phrase from raw entropy (16/20/24/28/32 bytes).
pub fn from_entropy(entropy: &[u8]) -> Result<Mnemonic> {
    Mnemonic::from_entropy_in(Language::English, entropy)
        .map_err(|e| Error::InvalidMnemonic(format!("entropy encoding: {e}")))
}

/// Redact a phrase for display: the first three words stay, every later
/// word is replaced character-for-character with a bullet. Word lengths
/// remain visible; callers that cannot accept that leak must not display
/// masked phrases at all.
pub fn mask(phrase: &str) -> String {
    let mut out = String::with_capacity(phrase.len());
    for (i, word) in phrase.split_whitespace().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        if i < 3 {
            out.push_str(word);
        } else {
            for _ in word.chars() {
                out.push(MASK_PLACEHOLDER);
            }
        }
    }
    out
}

/// Best-effort zeroization of a phrase buffer owned by the caller.
pub fn wipe_phrase(phrase: &mut String) {
    phrase.zeroize();
}
