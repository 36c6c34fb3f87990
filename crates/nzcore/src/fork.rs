//! Stateless fork detection over a set of documents. Detection only:
//! the core records and reports forks, and resolution happens through
//! the explicit primitives below, never automatically.

use crate::document::{Document, DocumentBuilder};
use crate::encoding;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

/// A detected fork: two or more documents claiming the same parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkInfo {
    pub parent_hash: String,
    pub document_ids: Vec<String>,
    /// Logical time at which the fork was observed.
    pub detected_at: u64,
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

/// Group documents by `parent_hash` and emit one entry per group of two
/// or more, sorted by `detected_at` ascending.
pub fn scan(documents: &[Document]) -> Vec<ForkInfo> {
    let mut groups: BTreeMap<&str, Vec<&Document>> = BTreeMap::new();
    for doc in documents {
        if let (Some(parent), Some(_)) = (doc.parent_hash(), doc.id()) {
            groups.entry(parent).or_default().push(doc);
        }
    }

    let mut entries: Vec<ForkInfo> = groups
        .into_iter()
        .filter(|(_, group)| group.len() >= 2)
        .map(|(parent, group)| ForkInfo {
            parent_hash: parent.to_string(),
            document_ids: group.iter().filter_map(|d| d.id()).map(String::from).collect(),
            detected_at: group.iter().filter_map(|d| d.logical_time()).max().unwrap_or(0),
            resolved: false,
            resolution: None,
        })
        .collect();
    entries.sort_by_key(|entry| entry.detected_at);
    entries
}

/// A partial `"merge"` document referencing the conflicting branches.
/// The caller completes, signs, and appends it; the fork itself stays
/// unresolved until [`resolve_fork`] is applied explicitly.
pub fn create_merge_document(conflict_hashes: &[String], resolution: &str) -> Result<DocumentBuilder> {
    if conflict_hashes.len() < 2 {
        return Err(Error::ForkDetected(
            "merge requires at least two conflicting hashes".into(),
        ));
    }
    for hash in conflict_hashes {
        if !encoding::is_hex64(hash) {
            return Err(Error::ForkDetected(format!(
                "conflicting hash {hash:?} is not 64 lowercase hex characters"
            )));
        }
    }
    Ok(DocumentBuilder::new().doc_type("merge").payload(json!({
        "conflicts": conflict_hashes,
        "resolution": resolution,
    })))
}

/// A fork is active while more than one of its branches still appears
/// in, or is referenced as a parent by, the current document set.
pub fn is_fork_active(fork: &ForkInfo, documents: &[Document]) -> bool {
    let live = fork
        .document_ids
        .iter()
        .filter(|branch| {
            documents.iter().any(|doc| {
                doc.id() == Some(branch.as_str()) || doc.parent_hash() == Some(branch.as_str())
            })
        })
        .count();
    live > 1
}

/// Pure resolution: a copy of the fork marked resolved, pointing at the
/// resolving document.
pub fn resolve_fork(fork: &ForkInfo, resolution_doc_id: &str) -> ForkInfo {
    ForkInfo {
        resolved: true,
        resolution: Some(resolution_doc_id.to_string()),
        ..fork.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::GENESIS_HASH;

    fn doc(id_byte: u8, parent: &str, logical_time: u64) -> Document {
        DocumentBuilder::new()
            .doc_type("test")
            .chain_id(&"ab".repeat(32))
            .parent_hash(parent)
            .logical_time(logical_time)
            .id(&hex::encode([id_byte; 32]))
            .build()
            .unwrap()
    }

    #[test]
    fn scan_finds_shared_parent() {
        let shared = "cd".repeat(32);
        let docs = vec![
            doc(1, GENESIS_HASH, 1),
            doc(2, &shared, 2),
            doc(3, &shared, 5),
        ];
        let forks = scan(&docs);
        assert_eq!(forks.len(), 1);
        let fork = &forks[0];
        assert_eq!(fork.parent_hash, shared);
        assert_eq!(fork.document_ids.len(), 2);
        assert!(fork.document_ids.contains(&hex::encode([2u8; 32])));
        assert!(fork.document_ids.contains(&hex::encode([3u8; 32])));
        assert_eq!(fork.detected_at, 5);
        assert!(!fork.resolved);
    }

    #[test]
    fn scan_sorts_by_detection_time() {
        let p1 = "11".repeat(32);
        let p2 = "22".repeat(32);
        let docs = vec![
            doc(1, &p1, 8),
            doc(2, &p1, 9),
            doc(3, &p2, 2),
            doc(4, &p2, 3),
        ];
        let forks = scan(&docs);
        assert_eq!(forks.len(), 2);
        assert!(forks[0].detected_at <= forks[1].detected_at);
    }

    #[test]
    fn linear_chain_has_no_forks() {
        let d1 = doc(1, GENESIS_HASH, 1);
        let d2 = doc(2, d1.id().unwrap(), 2);
        assert!(scan(&[d1, d2]).is_empty());
    }

    #[test]
    fn merge_document_preconditions() {
        let hashes = vec!["aa".repeat(32), "bb".repeat(32)];
        let builder = create_merge_document(&hashes, "keep first").unwrap();
        let merge = builder
            .chain_id(&"ab".repeat(32))
            .parent_hash(GENESIS_HASH)
            .logical_time(9)
            .build()
            .unwrap();
        assert_eq!(merge.doc_type(), Some("merge"));
        assert_eq!(merge.payload().unwrap()["conflicts"][1], "bb".repeat(32));

        let one = vec!["aa".repeat(32)];
        assert_eq!(
            create_merge_document(&one, "x").unwrap_err().code(),
            "ForkDetected"
        );
        let bad = vec!["aa".repeat(32), "not-hex".into()];
        assert_eq!(
            create_merge_document(&bad, "x").unwrap_err().code(),
            "ForkDetected"
        );
    }

    #[test]
    fn fork_activity_follows_references() {
        let shared = "cd".repeat(32);
        let a = doc(2, &shared, 2);
        let b = doc(3, &shared, 3);
        let fork = ForkInfo {
            parent_hash: shared,
            document_ids: vec![a.id().unwrap().into(), b.id().unwrap().into()],
            detected_at: 3,
            resolved: false,
            resolution: None,
        };
        assert!(is_fork_active(&fork, &[a.clone(), b.clone()]));
        // Only one branch still present: no longer active.
        assert!(!is_fork_active(&fork, &[a.clone()]));
        // A child referencing branch b keeps the fork active.
        let child = doc(4, b.id().unwrap(), 4);
        assert!(is_fork_active(&fork, &[a, child]));
    }

    #[test]
    fn resolve_is_a_pure_copy() {
        let fork = ForkInfo {
            parent_hash: "cd".repeat(32),
            document_ids: vec!["x".into(), "y".into()],
            detected_at: 4,
            resolved: false,
            resolution: None,
        };
        let resolved = resolve_fork(&fork, "zz");
        assert!(resolved.resolved);
        assert_eq!(resolved.resolution.as_deref(), Some("zz"));
        assert!(!fork.resolved);
    }
}
