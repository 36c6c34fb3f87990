use crate::canonical;
use crate::document::{Document, DOC_VERSION, REQUIRED_FIELDS};
use crate::encoding;
use crate::error::Result;
use crate::suite;
use log::debug;
use serde::Serialize;
use serde_json::Value;

/// Application-defined policy predicate, evaluated last. An `Err` or an
/// `Ok(false)` verdict both fail the policy layer.
pub type PolicyFn = dyn Fn(&Document) -> Result<bool> + Send + Sync;

/// Outcome of a validation run. `final` (wire name) is the conjunction
/// of the three layer booleans; failures never surface as errors from
/// the validator itself.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub structural_valid: bool,
    pub cryptographic_valid: bool,
    pub policy_valid: bool,
    #[serde(rename = "final")]
    pub final_valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn failure(error: String) -> Self {
        ValidationResult {
            errors: vec![error],
            ..ValidationResult::default()
        }
    }
}

/// Three-layer document validation: structural, cryptographic, policy,
/// combined by logical conjunction. Later layers run only when earlier
/// layers pass; skipped layers report false.
pub struct Validator {
    policy: Option<Box<PolicyFn>>,
}

impl Validator {
    pub fn new() -> Self {
        Validator { policy: None }
    }

    pub fn with_policy(policy: Box<PolicyFn>) -> Self {
        Validator {
            policy: Some(policy),
        }
    }

    /// Validate an in-memory document against `trusted_keys`.
    /// `current_time`, when provided, only produces a warning for
    /// documents stamped ahead of the local clock.
    pub fn validate(
        &self,
        document: &Document,
        trusted_keys: &[[u8; 32]],
        current_time: Option<u64>,
    ) -> ValidationResult {
        let mut result = ValidationResult::default();

        check_structure(document, &mut result.errors);
        result.structural_valid = result.errors.is_empty();

        if result.structural_valid {
            result.cryptographic_valid = check_signature(
                document,
                trusted_keys,
                current_time,
                &mut result.errors,
                &mut result.warnings,
            );
        }

        if result.structural_valid && result.cryptographic_valid {
            result.policy_valid = self.check_policy(document, &mut result.errors);
        }

        result.final_valid =
            result.structural_valid && result.cryptographic_valid && result.policy_valid;
        if !result.final_valid {
            debug!("document rejected: {:?}", result.errors);
        }
        result
    }

    /// Validate a document arriving as JSON text. The raw input must
    /// already be in canonical form; any encoding variance fails the
    /// cryptographic layer before a signature is ever checked.
    pub fn validate_json(
        &self,
        input: &str,
        trusted_keys: &[[u8; 32]],
        current_time: Option<u64>,
    ) -> ValidationResult {
        let document = match Document::from_json(input) {
            Ok(document) => document,
            Err(e) => return ValidationResult::failure(e.to_string()),
        };
        if let Err(e) = canonical::assert_canonical(input) {
            let mut result = ValidationResult::default();
            check_structure(&document, &mut result.errors);
            result.structural_valid = result.errors.is_empty();
            result.errors.push(e.to_string());
            return result;
        }
        self.validate(&document, trusted_keys, current_time)
    }

    fn check_policy(&self, document: &Document, errors: &mut Vec<String>) -> bool {
        match &self.policy {
            None => true,
            Some(policy) => match policy(document) {
                Ok(true) => true,
                Ok(false) => {
                    errors.push("policy evaluator rejected the document".to_string());
                    false
                }
                Err(e) => {
                    errors.push(format!("policy evaluator failed: {e}"));
                    false
                }
            },
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

fn check_structure(document: &Document, errors: &mut Vec<String>) {
    for field in REQUIRED_FIELDS {
        match document.get(field) {
            None => errors.push(format!("missing required field {field:?}")),
            Some(Value::String(s)) if s.is_empty() => {
                errors.push(format!("field {field:?} is empty"))
            }
            Some(_) => {}
        }
    }

    match document.logical_time() {
        Some(time) if time >= 1 => {}
        Some(_) | None => {
            if document.get("logical_time").is_some() {
                errors.push("logical_time must be an integer >= 1".to_string());
            }
        }
    }

    if let Some(declared) = document.crypto_suite() {
        if declared != suite::CRYPTO_SUITE {
            errors.push(format!(
                "crypto_suite {declared:?} is not {:?}",
                suite::CRYPTO_SUITE
            ));
        }
    }

    if let Some(version) = document.version() {
        if version != DOC_VERSION {
            errors.push(format!("version {version:?} is not {DOC_VERSION:?}"));
        }
    }

    if let Some(parent_hash) = document.parent_hash() {
        if !encoding::is_hex64(parent_hash) {
            errors.push("parent_hash must match ^[0-9a-f]{64}$".to_string());
        }
    }
}

fn check_signature(
    document: &Document,
    trusted_keys: &[[u8; 32]],
    current_time: Option<u64>,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) -> bool {
    let payload = match document.signing_payload() {
        Ok(payload) => payload,
        Err(e) => {
            errors.push(e.to_string());
            return false;
        }
    };
    if let Err(e) = canonical::assert_canonical(&payload) {
        errors.push(e.to_string());
        return false;
    }

    let signature_hex = match document.signature() {
        Some(signature_hex) => signature_hex,
        None => {
            errors.push("signature is missing".to_string());
            return false;
        }
    };
    let signature = match encoding::decode_hex_exact(signature_hex, suite::SIGNATURE_LENGTH) {
        Ok(signature) => signature,
        Err(e) => {
            errors.push(format!("signature decode: {e}"));
            return false;
        }
    };

    if trusted_keys.is_empty() {
        errors.push("no trusted keys provided".to_string());
        return false;
    }
    let verified = trusted_keys.iter().any(|key| {
        suite::verify(key, payload.as_bytes(), &signature).unwrap_or(false)
    });
    if !verified {
        errors.push("signature does not verify against any trusted key".to_string());
        return false;
    }

    if let (Some(now), Some(time)) = (current_time, document.logical_time()) {
        if time > now {
            warnings.push(format!(
                "logical_time {time} is ahead of the local clock {now}"
            ));
        }
    }
    true
}

/// Cryptographic-layer check alone, against a single key.
pub fn quick_validate(document: &Document, public_key: &[u8; 32]) -> bool {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    check_signature(document, &[*public_key], None, &mut errors, &mut warnings)
}

/// Linkage check over a set of documents: sorted by logical time, every
/// adjacent pair must chain by parent hash with strictly increasing
/// times.
pub fn validate_chain(documents: &[Document]) -> bool {
    let mut sorted: Vec<&Document> = documents.iter().collect();
    sorted.sort_by_key(|doc| doc.logical_time().unwrap_or(0));
    sorted.windows(2).all(|pair| {
        match (
            pair[0].id(),
            pair[0].logical_time(),
            pair[1].parent_hash(),
            pair[1].logical_time(),
        ) {
            (Some(prev_id), Some(prev_time), Some(parent), Some(time)) => {
                parent == prev_id && time > prev_time
            }
            _ => false,
        }
    })
}
