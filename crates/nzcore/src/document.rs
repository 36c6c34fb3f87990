use crate::canonical;
use crate::clock::MAX_LOGICAL_TIME;
use crate::derivation;
use crate::encoding;
use crate::error::{Error, Result};
use crate::suite;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parent hash of the first document in a chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Document schema version.
pub const DOC_VERSION: &str = "1.0";

/// Fields every document must carry. `payload` is optional and opaque.
pub const REQUIRED_FIELDS: [&str; 9] = [
    "type",
    "version",
    "id",
    "chain_id",
    "parent_hash",
    "logical_time",
    "crypto_suite",
    "created_at",
    "signature",
];

/// A chain record. Structurally a JSON object: the known fields of the
/// schema plus any unknown fields, which are preserved verbatim and
/// covered by the signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    /// Wrap a JSON object. Non-objects are rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Document { fields }),
            other => Err(Error::ValidationFailed(format!(
                "document must be a json object, got {}",
                type_name(&other)
            ))),
        }
    }

    /// Parse a document from JSON text. No canonicality requirement is
    /// imposed here; wire-level validation goes through
    /// [`crate::validator::Validator::validate_json`].
    pub fn from_json(input: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(input)
            .map_err(|e| Error::ValidationFailed(format!("document parse: {e}")))?;
        Self::from_value(value)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn doc_type(&self) -> Option<&str> {
        self.get_str("type")
    }

    pub fn version(&self) -> Option<&str> {
        self.get_str("version")
    }

    pub fn id(&self) -> Option<&str> {
        self.get_str("id")
    }

    pub fn chain_id(&self) -> Option<&str> {
        self.get_str("chain_id")
    }

    pub fn parent_hash(&self) -> Option<&str> {
        self.get_str("parent_hash")
    }

    /// Logical time, if present as a non-negative integer.
    pub fn logical_time(&self) -> Option<u64> {
        self.fields.get("logical_time").and_then(Value::as_u64)
    }

    pub fn crypto_suite(&self) -> Option<&str> {
        self.get_str("crypto_suite")
    }

    pub fn created_at(&self) -> Option<&str> {
        self.get_str("created_at")
    }

    pub fn payload(&self) -> Option<&Value> {
        self.fields.get("payload")
    }

    pub fn signature(&self) -> Option<&str> {
        self.get_str("signature")
    }

    pub(crate) fn set_signature(&mut self, signature_hex: &str) {
        self.fields
            .insert("signature".to_string(), Value::String(signature_hex.to_string()));
    }

    /// Full canonical serialization, signature included.
    pub fn canonical_json(&self) -> Result<String> {
        canonical::serialize(&self.to_value())
    }

    /// Canonical serialization with the signature stripped: the exact
    /// bytes that are signed and verified.
    pub fn signing_payload(&self) -> Result<String> {
        canonical::prepare_for_signing(&self.to_value())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// ISO-8601 creation timestamp. Informational only; nothing in the core
/// derives a security decision from it.
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Records fields one by one and is consumed exactly once by
/// [`DocumentBuilder::build`], which applies defaults, derives the id
/// when unset, and canonicalizes.
///
/// The builder never touches private key material; signing belongs to
/// the facade.
#[derive(Debug, Default, Clone)]
pub struct DocumentBuilder {
    fields: Map<String, Value>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn doc_type(self, doc_type: &str) -> Self {
        self.set("type", Value::String(doc_type.to_string()))
    }

    pub fn version(self, version: &str) -> Self {
        self.set("version", Value::String(version.to_string()))
    }

    pub fn id(self, id: &str) -> Self {
        self.set("id", Value::String(id.to_string()))
    }

    pub fn chain_id(self, chain_id: &str) -> Self {
        self.set("chain_id", Value::String(chain_id.to_string()))
    }

    pub fn parent_hash(self, parent_hash: &str) -> Self {
        self.set("parent_hash", Value::String(parent_hash.to_string()))
    }

    pub fn logical_time(self, logical_time: u64) -> Self {
        self.set("logical_time", Value::from(logical_time))
    }

    pub fn crypto_suite(self, crypto_suite: &str) -> Self {
        self.set("crypto_suite", Value::String(crypto_suite.to_string()))
    }

    pub fn created_at(self, created_at: &str) -> Self {
        self.set("created_at", Value::String(created_at.to_string()))
    }

    pub fn payload(self, payload: Value) -> Self {
        self.set("payload", payload)
    }

    pub fn signature(self, signature_hex: &str) -> Self {
        self.set("signature", Value::String(signature_hex.to_string()))
    }

    /// Attach an application field. Refuses to overwrite anything that
    /// is already set, schema fields included.
    pub fn add_field(mut self, key: &str, value: Value) -> Result<Self> {
        if self.fields.contains_key(key) {
            return Err(Error::ValidationFailed(format!(
                "field {key:?} is already set"
            )));
        }
        self.fields.insert(key.to_string(), value);
        Ok(self)
    }

    /// Assert required fields, apply defaults, derive the id when unset,
    /// and canonicalize the result.
    pub fn build(mut self) -> Result<Document> {
        let doc_type = require_str(&self.fields, "type")?;
        if doc_type.is_empty() {
            return Err(Error::ValidationFailed("type must not be empty".into()));
        }
        let chain_id = require_str(&self.fields, "chain_id")?.to_string();
        let parent_hash = require_str(&self.fields, "parent_hash")?.to_string();
        if !encoding::is_hex64(&parent_hash) {
            return Err(Error::ValidationFailed(
                "parent_hash must be 64 lowercase hex characters".into(),
            ));
        }

        let logical_time = self
            .fields
            .get("logical_time")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                Error::LogicalTimeViolation("logical_time must be a positive integer".into())
            })?;
        if logical_time == 0 || logical_time > MAX_LOGICAL_TIME {
            return Err(Error::LogicalTimeViolation(format!(
                "logical_time {logical_time} outside [1, {MAX_LOGICAL_TIME}]"
            )));
        }

        let declared_suite = self
            .fields
            .get("crypto_suite")
            .and_then(Value::as_str)
            .map(String::from);
        match declared_suite {
            None => {
                self.fields.insert(
                    "crypto_suite".to_string(),
                    Value::String(suite::CRYPTO_SUITE.to_string()),
                );
            }
            Some(declared) if declared != suite::CRYPTO_SUITE => {
                return Err(Error::CryptoSuiteMismatch {
                    expected: suite::CRYPTO_SUITE,
                    found: declared,
                });
            }
            Some(_) => {}
        }

        if !self.fields.contains_key("version") {
            self.fields
                .insert("version".to_string(), Value::String(DOC_VERSION.to_string()));
        }

        if !self.fields.contains_key("id") {
            let id = derivation::derive_document_id(&chain_id, &parent_hash, logical_time)?;
            self.fields.insert("id".to_string(), Value::String(id));
        }

        if !self.fields.contains_key("created_at") {
            self.fields
                .insert("created_at".to_string(), Value::String(now_timestamp()));
        }

        // Canonicalization doubles as a serializability check.
        let document = Document {
            fields: self.fields,
        };
        document.canonical_json()?;
        Ok(document)
    }
}

fn require_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::ValidationFailed(format!("missing required field {key:?}")))
}
