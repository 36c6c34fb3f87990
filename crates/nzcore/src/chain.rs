use crate::clock::{ClockState, LogicalClock};
use crate::derivation;
use crate::document::{Document, GENESIS_HASH};
use crate::error::{Error, Result};
use crate::fork::ForkInfo;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// The authoritative append-only log for one chain id. Owns the logical
/// clock and the recorded fork table; `last_hash` always names the most
/// recently appended document (genesis sentinel while empty).
#[derive(Debug, Clone)]
pub struct ChainState {
    chain_id: String,
    documents: Vec<Document>,
    index: HashMap<String, usize>,
    last_hash: String,
    clock: LogicalClock,
    forks: Vec<ForkInfo>,
    // Result of the last global scan; any append invalidates it, since
    // the scan is authoritative over per-append detection.
    scan_cache: Option<Vec<ForkInfo>>,
}

/// Read-only view handed out by the facade.
#[derive(Debug, Clone, Serialize)]
pub struct ChainSnapshot {
    pub chain_id: String,
    pub last_hash: String,
    pub logical_clock: u64,
    /// Documents sorted by logical time.
    pub documents: Vec<Document>,
    pub forks: Vec<ForkInfo>,
}

/// Sort direction for [`DocumentQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Pagination and filtering over stored documents.
#[derive(Debug, Clone)]
pub struct DocumentQuery {
    pub doc_type: Option<String>,
    pub sort_by: String,
    pub order: SortOrder,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Default for DocumentQuery {
    fn default() -> Self {
        DocumentQuery {
            doc_type: None,
            sort_by: "logical_time".to_string(),
            order: SortOrder::Ascending,
            offset: 0,
            limit: None,
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentPage {
    pub documents: Vec<Document>,
    pub total: usize,
    pub has_more: bool,
}

/// Self-describing export blob (UTF-8 JSON).
#[derive(Debug, Serialize, Deserialize)]
struct ChainExport {
    #[serde(rename = "chainId")]
    chain_id: String,
    #[serde(rename = "lastHash")]
    last_hash: String,
    clock: ClockState,
    documents: Vec<(String, Document)>,
    forks: Vec<(String, ForkInfo)>,
}

impl ChainState {
    pub fn new(chain_id: String, clock: LogicalClock) -> Self {
        ChainState {
            chain_id,
            documents: Vec::new(),
            index: HashMap::new(),
            last_hash: GENESIS_HASH.to_string(),
            clock,
            forks: Vec::new(),
            scan_cache: None,
        }
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn last_hash(&self) -> &str {
        &self.last_hash
    }

    pub fn clock(&self) -> &LogicalClock {
        &self.clock
    }

    pub(crate) fn clock_mut(&mut self) -> &mut LogicalClock {
        &mut self.clock
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.index.get(id).map(|&pos| &self.documents[pos])
    }

    /// Documents in insertion order.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Documents sorted by logical time.
    pub fn documents_by_time(&self) -> Vec<Document> {
        let mut sorted = self.documents.clone();
        sorted.sort_by_key(|doc| doc.logical_time().unwrap_or(0));
        sorted
    }

    /// Recorded forks, per-append detections and merged scan results.
    pub fn forks(&self) -> &[ForkInfo] {
        &self.forks
    }

    /// Append a signed document.
    ///
    /// The document must belong to this chain and carry a fresh id. A
    /// parent other than `last_hash` triggers per-append fork detection;
    /// the append itself still succeeds, because recording the fork and
    /// refusing the evidence would be self-defeating.
    pub fn append(&mut self, document: Document) -> Result<()> {
        match document.chain_id() {
            Some(chain_id) if chain_id == self.chain_id => {}
            other => {
                return Err(Error::ValidationFailed(format!(
                    "document chain id {:?} does not match {:?}",
                    other, self.chain_id
                )))
            }
        }
        let id = document
            .id()
            .ok_or_else(|| Error::ValidationFailed("document has no id".into()))?
            .to_string();
        if self.index.contains_key(&id) {
            return Err(Error::ValidationFailed(format!(
                "document {id} already appended"
            )));
        }
        let parent_hash = document
            .parent_hash()
            .ok_or_else(|| Error::ValidationFailed("document has no parent_hash".into()))?
            .to_string();
        let logical_time = document.logical_time().ok_or_else(|| {
            Error::LogicalTimeViolation("document has no integer logical_time".into())
        })?;

        if parent_hash != self.last_hash {
            let mut siblings: Vec<String> = self
                .documents
                .iter()
                .filter(|doc| doc.parent_hash() == Some(parent_hash.as_str()))
                .filter_map(|doc| doc.id())
                .map(String::from)
                .collect();
            if !siblings.is_empty() {
                siblings.push(id.clone());
                warn!(
                    "fork at parent {parent_hash}: {} documents share it",
                    siblings.len()
                );
                self.record_fork(ForkInfo {
                    parent_hash: parent_hash.clone(),
                    document_ids: siblings,
                    detected_at: self.clock.current(),
                    resolved: false,
                    resolution: None,
                });
            }
        }

        self.index.insert(id.clone(), self.documents.len());
        self.documents.push(document);
        self.last_hash = id;
        self.scan_cache = None;
        if logical_time > self.clock.current() {
            self.clock.sync(logical_time)?;
        }
        Ok(())
    }

    /// Merge a fork entry into the recorded table. A fork that was
    /// already resolved manually stays resolved.
    pub(crate) fn record_fork(&mut self, fork: ForkInfo) {
        match self
            .forks
            .iter_mut()
            .find(|existing| existing.parent_hash == fork.parent_hash)
        {
            Some(existing) if existing.resolved => {}
            Some(existing) => {
                // Keep the first observation time, refresh the branches.
                existing.document_ids = fork.document_ids;
            }
            None => self.forks.push(fork),
        }
    }

    pub(crate) fn record_forks(&mut self, forks: &[ForkInfo]) {
        for fork in forks {
            self.record_fork(fork.clone());
        }
    }

    pub(crate) fn scan_cache(&self) -> Option<&Vec<ForkInfo>> {
        self.scan_cache.as_ref()
    }

    pub(crate) fn set_scan_cache(&mut self, forks: Vec<ForkInfo>) {
        self.scan_cache = Some(forks);
    }

    /// Mark a recorded fork as resolved by the given document. Manual
    /// resolution is the only path that ever flips `resolved`.
    pub fn mark_fork_resolved(&mut self, parent_hash: &str, resolution_doc_id: &str) -> Result<()> {
        let fork = self
            .forks
            .iter_mut()
            .find(|fork| fork.parent_hash == parent_hash)
            .ok_or_else(|| {
                Error::ForkDetected(format!("no recorded fork at parent {parent_hash}"))
            })?;
        fork.resolved = true;
        fork.resolution = Some(resolution_doc_id.to_string());
        Ok(())
    }

    /// Walk the chain in logical-time order and re-derive every id from
    /// `(chain_id, parent_hash, logical_time)`. True iff linkage and
    /// derivation both hold end to end.
    pub fn verify_integrity(&self) -> bool {
        let mut prev = GENESIS_HASH.to_string();
        for document in self.documents_by_time() {
            let (id, parent_hash, logical_time) =
                match (document.id(), document.parent_hash(), document.logical_time()) {
                    (Some(id), Some(parent), Some(time)) => (id, parent, time),
                    _ => return false,
                };
            if parent_hash != prev {
                return false;
            }
            let derived =
                match derivation::derive_document_id(&self.chain_id, parent_hash, logical_time) {
                    Ok(derived) => derived,
                    Err(_) => return false,
                };
            if !crate::security::constant_time_str_eq(id, &derived) {
                return false;
            }
            prev = derived;
        }
        true
    }

    /// Serialize the full manager state to a self-describing JSON blob.
    pub fn export(&self) -> Result<Vec<u8>> {
        let export = ChainExport {
            chain_id: self.chain_id.clone(),
            last_hash: self.last_hash.clone(),
            clock: self.clock.state(),
            documents: self
                .documents
                .iter()
                .filter_map(|doc| doc.id().map(|id| (id.to_string(), doc.clone())))
                .collect(),
            forks: self
                .forks
                .iter()
                .map(|fork| (fork.parent_hash.clone(), fork.clone()))
                .collect(),
        };
        serde_json::to_vec(&export)
            .map_err(|e| Error::ValidationFailed(format!("state export: {e}")))
    }

    /// Rebuild a manager from an exported blob. The blob's chain id must
    /// match `expected_chain_id`; on any failure the caller's previous
    /// state is untouched.
    pub fn import(bytes: &[u8], expected_chain_id: &str) -> Result<Self> {
        let export: ChainExport = serde_json::from_slice(bytes)
            .map_err(|e| Error::ValidationFailed(format!("state import: {e}")))?;
        if export.chain_id != expected_chain_id {
            warn!(
                "rejecting state import for chain {} (expected {})",
                export.chain_id, expected_chain_id
            );
            return Err(Error::ValidationFailed(format!(
                "imported chain id {} does not match {expected_chain_id}",
                export.chain_id
            )));
        }
        let clock = LogicalClock::from_state(&export.clock)?;
        let mut state = ChainState::new(export.chain_id, clock);
        for (id, document) in export.documents {
            if document.id() != Some(id.as_str()) {
                return Err(Error::ValidationFailed(format!(
                    "export entry {id} does not match its document id"
                )));
            }
            state.index.insert(id, state.documents.len());
            state.documents.push(document);
        }
        state.last_hash = export.last_hash;
        state.forks = export.forks.into_iter().map(|(_, fork)| fork).collect();
        debug!(
            "imported chain {} with {} documents",
            state.chain_id,
            state.documents.len()
        );
        Ok(state)
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            chain_id: self.chain_id.clone(),
            last_hash: self.last_hash.clone(),
            logical_clock: self.clock.current(),
            documents: self.documents_by_time(),
            forks: self.forks.clone(),
        }
    }

    /// Filter, sort, and paginate stored documents.
    pub fn query(&self, query: &DocumentQuery) -> DocumentPage {
        let mut matched: Vec<&Document> = self
            .documents
            .iter()
            .filter(|doc| match &query.doc_type {
                Some(wanted) => doc.doc_type() == Some(wanted.as_str()),
                None => true,
            })
            .collect();
        matched.sort_by(|a, b| {
            let ordering = compare_field(a, b, &query.sort_by);
            match query.order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });

        let total = matched.len();
        let documents: Vec<Document> = matched
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        let has_more = query.offset + documents.len() < total;
        DocumentPage {
            documents,
            total,
            has_more,
        }
    }
}

fn compare_field(a: &Document, b: &Document, field: &str) -> Ordering {
    match (a.get(field), b.get(field)) {
        (Some(x), Some(y)) => compare_values(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_values(x: &serde_json::Value, y: &serde_json::Value) -> Ordering {
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (x.as_str(), y.as_str()) {
        return a.cmp(b);
    }
    x.to_string().cmp(&y.to_string())
}
