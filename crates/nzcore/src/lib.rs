//! Personal autonomous root of trust: a BIP-39 phrase deterministically
//! becomes an Ed25519 identity, and that identity maintains a signed,
//! hash-linked, append-only document chain that verifies offline.

pub mod canonical;
pub mod chain;
pub mod clock;
pub mod derivation;
pub mod document;
pub mod encoding;
mod error;
pub mod fork;
pub mod mnemonic;
pub mod security;
pub mod suite;
pub mod validator;

use log::{debug, warn};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub use crate::chain::{ChainSnapshot, ChainState, DocumentPage, DocumentQuery, SortOrder};
pub use crate::clock::{ClockState, LogicalClock, CLOCK_VERSION, MAX_LOGICAL_TIME};
pub use crate::derivation::{derive_document_id, derive_identity, RootIdentity};
pub use crate::document::{Document, DocumentBuilder, DOC_VERSION, GENESIS_HASH, REQUIRED_FIELDS};
pub use crate::error::{Error, Result};
pub use crate::fork::ForkInfo;
pub use crate::suite::{CRYPTO_SUITE, SIGNATURE_LENGTH};
pub use crate::validator::{
    quick_validate, validate_chain, PolicyFn, ValidationResult, Validator,
};

/// Construction options for [`NzCore::create`].
#[derive(Default)]
pub struct CoreOptions {
    /// Override the chain id derived from the identity.
    pub chain_id: Option<String>,
    /// Starting logical time; defaults to 1.
    pub initial_time: Option<u64>,
    /// Application policy evaluated as the validator's last layer.
    pub policy: Option<Box<PolicyFn>>,
}

/// What a holder needs to recreate this identity elsewhere. The phrase
/// is the identity; treat the whole struct as secret. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct IdentityExport {
    pub mnemonic: String,
    pub chain_id: String,
}

/// The single owning handle over one identity and its chain.
///
/// There is no internal concurrency or locking; a facade is used from
/// one logical owner at a time. Call [`NzCore::destroy`] on every exit
/// path; afterwards every operation fails until a fresh facade is built.
pub struct NzCore {
    identity: Option<RootIdentity>,
    mnemonic: Option<SecretString>,
    chain: Option<ChainState>,
    validator: Validator,
    destroyed: bool,
}

fn destroyed_error() -> Error {
    Error::ValidationFailed("facade is destroyed".into())
}

impl NzCore {
    /// Derive the identity from `mnemonic_phrase` and set up an empty
    /// chain. scrypt makes this deliberately slow; keep it off
    /// latency-sensitive loops.
    pub fn create(mnemonic_phrase: &str, options: CoreOptions) -> Result<Self> {
        security::disable_core_dumps().ok();
        let parsed = mnemonic::parse(mnemonic_phrase)?;
        let mut identity = derivation::derive_identity(&parsed)?;
        let clock = match LogicalClock::new(options.initial_time.unwrap_or(1)) {
            Ok(clock) => clock,
            Err(e) => {
                identity.wipe();
                return Err(e);
            }
        };
        let chain_id = options
            .chain_id
            .unwrap_or_else(|| identity.chain_id().to_string());
        let chain = ChainState::new(chain_id, clock);
        let validator = match options.policy {
            Some(policy) => Validator::with_policy(policy),
            None => Validator::new(),
        };
        debug!("facade created for chain {}", chain.chain_id());
        Ok(NzCore {
            identity: Some(identity),
            mnemonic: Some(SecretString::new(parsed.to_string())),
            chain: Some(chain),
            validator,
            destroyed: false,
        })
    }

    fn identity(&self) -> Result<&RootIdentity> {
        self.identity.as_ref().ok_or_else(destroyed_error)
    }

    fn chain_ref(&self) -> Result<&ChainState> {
        self.chain.as_ref().ok_or_else(destroyed_error)
    }

    /// Create, sign, and append the next document in the chain.
    ///
    /// On failure nothing is appended and the clock reads as before;
    /// state only ever changes at operation boundaries.
    pub fn create_document(&mut self, doc_type: &str, payload: Option<Value>) -> Result<Document> {
        let identity = self.identity.as_ref().ok_or_else(destroyed_error)?;
        let chain = self.chain.as_mut().ok_or_else(destroyed_error)?;

        let previous = chain.clock().current();
        let logical_time = chain.clock_mut().tick()?;
        let parent_hash = chain.last_hash().to_string();
        let chain_id = chain.chain_id().to_string();

        let document = match build_signed_document(
            identity,
            &chain_id,
            &parent_hash,
            logical_time,
            doc_type,
            payload,
        ) {
            Ok(document) => document,
            Err(e) => {
                chain.clock_mut().restore(previous);
                return Err(e);
            }
        };
        if let Err(e) = chain.append(document.clone()) {
            chain.clock_mut().restore(previous);
            return Err(e);
        }
        Ok(document)
    }

    /// Run the three-layer validator against this chain's trusted key
    /// and current logical time. Never fails; problems land in the
    /// result.
    pub fn verify_document(&self, document: &Document) -> ValidationResult {
        let (identity, chain) = match (self.identity.as_ref(), self.chain.as_ref()) {
            (Some(identity), Some(chain)) => (identity, chain),
            _ => {
                let mut result = ValidationResult::default();
                result.errors.push(destroyed_error().to_string());
                return result;
            }
        };
        self.validator.validate(
            document,
            &[*identity.public_key()],
            Some(chain.clock().current()),
        )
    }

    /// Validate a document arriving as canonical JSON text.
    pub fn verify_document_json(&self, input: &str) -> ValidationResult {
        let (identity, chain) = match (self.identity.as_ref(), self.chain.as_ref()) {
            (Some(identity), Some(chain)) => (identity, chain),
            _ => {
                let mut result = ValidationResult::default();
                result.errors.push(destroyed_error().to_string());
                return result;
            }
        };
        self.validator.validate_json(
            input,
            &[*identity.public_key()],
            Some(chain.clock().current()),
        )
    }

    pub fn get_chain_state(&self) -> Result<ChainSnapshot> {
        Ok(self.chain_ref()?.snapshot())
    }

    /// Paginated, optionally type-filtered document listing.
    pub fn get_documents(&self, query: &DocumentQuery) -> Result<DocumentPage> {
        Ok(self.chain_ref()?.query(query))
    }

    /// Authoritative global fork scan, stamped with the current logical
    /// time and merged into the recorded fork table. The scan result is
    /// cached until the next append.
    pub fn detect_fork(&mut self) -> Result<Vec<ForkInfo>> {
        let chain = self.chain.as_mut().ok_or_else(destroyed_error)?;
        if let Some(cached) = chain.scan_cache() {
            return Ok(cached.clone());
        }
        let now = chain.clock().current();
        let mut entries = fork::scan(chain.documents());
        for entry in &mut entries {
            entry.detected_at = now;
            entry.resolved = false;
        }
        chain.record_forks(&entries);
        chain.set_scan_cache(entries.clone());
        Ok(entries)
    }

    /// Verify linkage and id derivation over the whole stored chain.
    pub fn verify_integrity(&self) -> Result<bool> {
        Ok(self.chain_ref()?.verify_integrity())
    }

    pub fn export_identity(&self) -> Result<IdentityExport> {
        let mnemonic = self
            .mnemonic
            .as_ref()
            .ok_or_else(destroyed_error)?
            .expose_secret()
            .clone();
        Ok(IdentityExport {
            mnemonic,
            chain_id: self.chain_ref()?.chain_id().to_string(),
        })
    }

    /// Serialize the chain manager, clock included, to a portable blob.
    pub fn export_state(&self) -> Result<Vec<u8>> {
        self.chain_ref()?.export()
    }

    /// Replace the chain manager with a previously exported one. The
    /// blob must belong to this facade's chain; on failure the current
    /// state stays intact.
    pub fn import_state(&mut self, bytes: &[u8]) -> Result<()> {
        let expected = self.chain_ref()?.chain_id().to_string();
        let imported = ChainState::import(bytes, &expected)?;
        self.chain = Some(imported);
        Ok(())
    }

    pub fn get_public_key(&self) -> Result<[u8; 32]> {
        Ok(*self.identity()?.public_key())
    }

    pub fn get_public_key_hex(&self) -> Result<String> {
        Ok(self.identity()?.public_key_hex())
    }

    pub fn get_chain_id(&self) -> Result<String> {
        Ok(self.chain_ref()?.chain_id().to_string())
    }

    /// Wipe the private key, drop identity, mnemonic, chain, and clock,
    /// and poison the handle. Idempotent.
    pub fn destroy(&mut self) {
        if let Some(mut identity) = self.identity.take() {
            if !identity.wipe() {
                warn!("private key wipe could not be confirmed");
            }
        }
        self.mnemonic = None;
        self.chain = None;
        self.destroyed = true;
        debug!("facade destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

fn build_signed_document(
    identity: &RootIdentity,
    chain_id: &str,
    parent_hash: &str,
    logical_time: u64,
    doc_type: &str,
    payload: Option<Value>,
) -> Result<Document> {
    let id = derivation::derive_document_id(chain_id, parent_hash, logical_time)?;
    let mut builder = DocumentBuilder::new()
        .doc_type(doc_type)
        .chain_id(chain_id)
        .parent_hash(parent_hash)
        .logical_time(logical_time)
        .id(&id);
    if let Some(payload) = payload {
        builder = builder.payload(payload);
    }
    let mut document = builder.build()?;
    let signing_payload = document.signing_payload()?;
    let signature = identity.sign(signing_payload.as_bytes())?;
    document.set_signature(&encoding::encode_hex(&signature));
    Ok(document)
}
