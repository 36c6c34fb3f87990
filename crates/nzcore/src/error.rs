use thiserror::Error;

/// Every failure mode of the core, as a closed set of codes.
///
/// Validation APIs never return these; they report failures inside
/// [`crate::validator::ValidationResult`]. Everything else propagates
/// this type.
#[derive(Debug, Error)]
pub enum Error {
    /// BIP-39 validation or decoding failure.
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// Seed derivation from a valid mnemonic failed.
    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    /// Hex parsing, key length, or KDF backend failure.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Signing or verification produced an unexpected result.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Canonical form assertion failed. Raised before any signature
    /// verification on non-canonical input.
    #[error("non-canonical json: {0}")]
    NonCanonicalJson(String),

    /// Merge-helper preconditions on conflicting hashes not met.
    #[error("fork precondition: {0}")]
    ForkDetected(String),

    /// Non-positive, non-strictly-increasing, overflowing, or frozen
    /// logical-clock operation.
    #[error("logical time violation: {0}")]
    LogicalTimeViolation(String),

    /// A document declares a suite other than the pinned one.
    #[error("crypto suite mismatch: expected {expected}, got {found}")]
    CryptoSuiteMismatch {
        expected: &'static str,
        found: String,
    },

    /// Generic validator-level failure (chain-id mismatch on import,
    /// destroyed facade, append-only violation).
    #[error("validation failed: {0}")]
    ValidationFailed(String),
}

impl Error {
    /// Stable machine-readable code for embedders that log or map errors.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidMnemonic(_) => "InvalidMnemonic",
            Error::InvalidSeed(_) => "InvalidSeed",
            Error::InvalidKey(_) => "InvalidKey",
            Error::InvalidSignature(_) => "InvalidSignature",
            Error::NonCanonicalJson(_) => "NonCanonicalJson",
            Error::ForkDetected(_) => "ForkDetected",
            Error::LogicalTimeViolation(_) => "LogicalTimeViolation",
            Error::CryptoSuiteMismatch { .. } => "CryptoSuiteMismatch",
            Error::ValidationFailed(_) => "ValidationFailed",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
