use nzcore::chain::ChainState;
use nzcore::document::DocumentBuilder;
use nzcore::{fork, mnemonic, suite, CoreOptions, Document, LogicalClock, NzCore, Validator, GENESIS_HASH};
use serde_json::{json, Value};

const VECTOR: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

#[test]
fn mnemonic_word_count_boundaries() {
    let words: Vec<&str> = VECTOR.split(' ').collect();
    let eleven = words[..11].join(" ");
    assert_eq!(
        mnemonic::validate(&eleven).unwrap_err().code(),
        "InvalidMnemonic"
    );

    let mut twenty_five = vec!["abandon"; 25];
    twenty_five[24] = "about";
    assert!(mnemonic::validate(&twenty_five.join(" ")).is_err());
}

#[test]
fn mnemonic_checksum_flip_rejected() {
    // "wrong" is on the word list but breaks the checksum here.
    let flipped = VECTOR.replace(" about", " wrong");
    assert_eq!(
        mnemonic::validate(&flipped).unwrap_err().code(),
        "InvalidMnemonic"
    );
}

fn signed_doc(private_key: &[u8; 32]) -> Document {
    let mut doc = DocumentBuilder::new()
        .doc_type("note")
        .chain_id(&"ab".repeat(32))
        .parent_hash(GENESIS_HASH)
        .logical_time(2)
        .payload(json!({"message": "Hello"}))
        .build()
        .unwrap();
    let payload = doc.signing_payload().unwrap();
    let signature = suite::sign(private_key, payload.as_bytes()).unwrap();
    let mut value = doc.to_value();
    value["signature"] = json!(hex::encode(signature));
    doc = Document::from_value(value).unwrap();
    doc
}

#[test]
fn tampering_any_signed_field_breaks_verification() {
    let (public, private) = suite::keypair_from_seed(&[3u8; 32]);
    let validator = Validator::new();
    let doc = signed_doc(&private);
    assert!(validator.validate(&doc, &[public], None).final_valid);

    let tampers: Vec<(&str, Value)> = vec![
        ("payload", json!({"message": "Hell0"})),
        ("type", json!("n0te")),
        ("parent_hash", json!("11".repeat(32))),
        ("logical_time", json!(3)),
        ("id", json!("22".repeat(32))),
        ("chain_id", json!("cd".repeat(32))),
    ];
    for (field, tampered_value) in tampers {
        let mut value = doc.to_value();
        value[field] = tampered_value;
        let tampered = Document::from_value(value).unwrap();
        let result = validator.validate(&tampered, &[public], None);
        assert!(
            !result.cryptographic_valid,
            "tampering {field} must break the signature"
        );
        assert!(!result.final_valid);
    }
}

#[test]
fn truncated_signature_is_rejected() {
    let (public, private) = suite::keypair_from_seed(&[3u8; 32]);
    let doc = signed_doc(&private);
    let mut value = doc.to_value();
    let short = value["signature"].as_str().unwrap()[..126].to_string();
    value["signature"] = json!(short);
    let truncated = Document::from_value(value).unwrap();
    let result = Validator::new().validate(&truncated, &[public], None);
    assert!(!result.cryptographic_valid);
    assert!(result.errors.iter().any(|e| e.contains("signature")));
}

#[test]
fn non_canonical_wire_form_is_rejected_before_verification() {
    let (public, private) = suite::keypair_from_seed(&[3u8; 32]);
    let doc = signed_doc(&private);
    let text = doc.canonical_json().unwrap();

    // Re-encode with whitespace: same value, different bytes.
    let value: Value = serde_json::from_str(&text).unwrap();
    let pretty = serde_json::to_string_pretty(&value).unwrap();
    let result = Validator::new().validate_json(&pretty, &[public], None);
    assert!(!result.cryptographic_valid);
    assert!(!result.final_valid);
    assert!(result.errors.iter().any(|e| e.contains("canonical")));
}

#[test]
fn unknown_fields_are_covered_by_the_signature() {
    let (public, private) = suite::keypair_from_seed(&[4u8; 32]);
    let mut doc = DocumentBuilder::new()
        .doc_type("note")
        .chain_id(&"ab".repeat(32))
        .parent_hash(GENESIS_HASH)
        .logical_time(2)
        .add_field("app_extension", json!({"tag": 1}))
        .unwrap()
        .build()
        .unwrap();
    let payload = doc.signing_payload().unwrap();
    let signature = suite::sign(&private, payload.as_bytes()).unwrap();
    let mut value = doc.to_value();
    value["signature"] = json!(hex::encode(signature));
    doc = Document::from_value(value).unwrap();

    // The unknown field survives a wire round-trip and still verifies.
    let round_tripped = Document::from_json(&doc.canonical_json().unwrap()).unwrap();
    assert_eq!(round_tripped.get("app_extension"), Some(&json!({"tag": 1})));
    let result = Validator::new().validate(&round_tripped, &[public], None);
    assert!(result.final_valid);

    // Mutating it breaks the signature.
    let mut value = round_tripped.to_value();
    value["app_extension"] = json!({"tag": 2});
    let tampered = Document::from_value(value).unwrap();
    assert!(
        !Validator::new()
            .validate(&tampered, &[public], None)
            .cryptographic_valid
    );
}

#[test]
fn import_rejects_foreign_chain_and_keeps_prior_state() {
    let mut core = NzCore::create(VECTOR, CoreOptions::default()).unwrap();
    core.create_document("note", None).unwrap();
    let before = core.get_chain_state().unwrap();

    let mut foreign = ChainState::new("cd".repeat(32), LogicalClock::new(1).unwrap());
    let doc = DocumentBuilder::new()
        .doc_type("note")
        .chain_id(&"cd".repeat(32))
        .parent_hash(GENESIS_HASH)
        .logical_time(2)
        .build()
        .unwrap();
    foreign.append(doc).unwrap();
    let blob = foreign.export().unwrap();

    let err = core.import_state(&blob).unwrap_err();
    assert_eq!(err.code(), "ValidationFailed");
    let after = core.get_chain_state().unwrap();
    assert_eq!(after.last_hash, before.last_hash);
    assert_eq!(after.logical_clock, before.logical_clock);
    assert_eq!(after.documents.len(), before.documents.len());
    core.destroy();
}

#[test]
fn forks_are_never_resolved_automatically() {
    let mut state = ChainState::new("ab".repeat(32), LogicalClock::new(1).unwrap());
    let d1 = DocumentBuilder::new()
        .doc_type("a")
        .chain_id(&"ab".repeat(32))
        .parent_hash(GENESIS_HASH)
        .logical_time(2)
        .build()
        .unwrap();
    let rival = DocumentBuilder::new()
        .doc_type("b")
        .chain_id(&"ab".repeat(32))
        .parent_hash(GENESIS_HASH)
        .logical_time(3)
        .id(&"55".repeat(32))
        .build()
        .unwrap();
    state.append(d1).unwrap();
    state.append(rival).unwrap();

    let forks = fork::scan(state.documents());
    assert_eq!(forks.len(), 1);
    assert!(!forks[0].resolved);
    assert_eq!(forks[0].document_ids.len(), 2);

    // Appending more documents never flips resolved.
    let child = DocumentBuilder::new()
        .doc_type("c")
        .chain_id(&"ab".repeat(32))
        .parent_hash(state.last_hash())
        .logical_time(4)
        .build()
        .unwrap();
    state.append(child).unwrap();
    assert!(state.forks().iter().all(|fork| !fork.resolved));

    // Only the explicit primitive resolves.
    let resolved = fork::resolve_fork(&state.forks()[0], "winner");
    assert!(resolved.resolved);
    assert_eq!(resolved.resolution.as_deref(), Some("winner"));
}

#[test]
fn merge_helper_preconditions() {
    let one = vec!["aa".repeat(32)];
    assert_eq!(
        fork::create_merge_document(&one, "r").unwrap_err().code(),
        "ForkDetected"
    );
}
