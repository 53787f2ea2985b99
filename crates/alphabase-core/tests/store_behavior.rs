use std::fs;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use alphabase_core::storage::{MutationEvent, MutationKind, WriteMode};
use alphabase_core::{AlphaBase, AlphaError, BatchOp, CipherKind, JsonSchema, StoreOptions};
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

fn open(dir: &TempDir, options: StoreOptions) -> AlphaBase {
    AlphaBase::open(dir.path().join("store.json"), options).expect("open should succeed")
}

#[test]
fn test_ttl_scenario() {
    let dir = tempdir().unwrap();
    let store = open(&dir, StoreOptions::new());

    store.set("k", json!({"v": 1}), Some(100)).unwrap();
    assert_eq!(store.get("k").unwrap(), Some(json!({"v": 1})));
    assert!(store.get_ttl("k").unwrap() <= 100);

    thread::sleep(Duration::from_millis(150));

    assert_eq!(store.get("k").unwrap(), None);
    assert!(!store.has("k").unwrap());
    assert_eq!(store.get_ttl("k").unwrap(), 0);
}

#[test]
fn test_expired_key_never_resurrects() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    {
        let store = AlphaBase::open(&path, StoreOptions::new()).unwrap();
        store.set("gone", json!(1), Some(20)).unwrap();
        store.set("kept", json!(2), None).unwrap();
        thread::sleep(Duration::from_millis(40));
        assert!(!store.has("gone").unwrap());

        store.begin_transaction().unwrap();
        store.rollback().unwrap();
        assert!(!store.has("gone").unwrap());
    }

    let reopened = AlphaBase::open(&path, StoreOptions::new()).unwrap();
    assert!(!reopened.has("gone").unwrap());
    assert_eq!(reopened.keys().unwrap(), vec!["kept".to_string()]);
}

#[test]
fn test_rollback_scenario() {
    let dir = tempdir().unwrap();
    let store = open(&dir, StoreOptions::new());

    store.set("x", json!(1), None).unwrap();
    store.begin_transaction().unwrap();
    store.set("x", json!(2), None).unwrap();
    assert_eq!(store.get("x").unwrap(), Some(json!(2)));
    store.rollback().unwrap();

    assert_eq!(store.get("x").unwrap(), Some(json!(1)));
}

#[test]
fn test_transactionally_is_atomic() {
    let dir = tempdir().unwrap();
    let store = open(
        &dir,
        StoreOptions::new().with_schema(JsonSchema::new(json!({"type": "integer"})).unwrap()),
    );
    store.set("a", json!(1), None).unwrap();
    let before = store.all().unwrap();
    let file_before = fs::read_to_string(store.path()).unwrap();

    let ops = vec![
        BatchOp::set("a", json!(10)),
        BatchOp::delete("a"),
        BatchOp::set("b", json!("not an integer")),
        BatchOp::set("c", json!(3)),
    ];
    let err = store.transactionally(&ops).unwrap_err();

    assert!(matches!(err, AlphaError::SchemaViolation { .. }));
    assert_eq!(store.all().unwrap(), before);
    assert_eq!(fs::read_to_string(store.path()).unwrap(), file_before);
    assert!(!store.in_transaction().unwrap());
}

#[test]
fn test_transactionally_json_rejects_unknown_op() {
    let dir = tempdir().unwrap();
    let store = open(&dir, StoreOptions::new());
    store.set("keep", json!(true), None).unwrap();

    let ops = vec![
        json!({"operation": "set", "key": "a", "value": 1}),
        json!({"operation": "upsert", "key": "b", "value": 2}),
    ];
    let err = store.transactionally_json(&ops).unwrap_err();

    assert!(matches!(err, AlphaError::UnknownBatchOp(ref tag) if tag == "upsert"));
    assert_eq!(store.keys().unwrap(), vec!["keep".to_string()]);
}

#[test]
fn test_batch_inside_transaction_rolls_back() {
    let dir = tempdir().unwrap();
    let store = open(&dir, StoreOptions::new());

    store.begin_transaction().unwrap();
    let applied = store
        .apply_batch(&[BatchOp::set("a", json!(1)), BatchOp::set_with_ttl("b", json!(2), 60_000)])
        .unwrap();
    assert_eq!(applied, 2);
    assert!(store.get_ttl("b").unwrap() > 0);
    store.rollback().unwrap();

    assert!(store.all().unwrap().is_empty());
}

#[test]
fn test_invalid_key_type_from_batch_input() {
    let dir = tempdir().unwrap();
    let store = open(&dir, StoreOptions::new());

    let err = store
        .apply_batch_json(&[json!({"operation": "set", "key": 12, "value": 1})])
        .unwrap_err();

    assert!(matches!(err, AlphaError::InvalidKeyType(_)));
    assert!(store.all().unwrap().is_empty());
}

#[test]
fn test_delete_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = open(&dir, StoreOptions::new());
    store.set("a", json!(1), Some(60_000)).unwrap();
    store.set("b", json!(2), None).unwrap();

    store.delete("a").unwrap();
    let once = (store.all().unwrap(), fs::read_to_string(store.path()).unwrap());
    store.delete("a").unwrap();
    let twice = (store.all().unwrap(), fs::read_to_string(store.path()).unwrap());

    assert_eq!(once, twice);
    assert_eq!(store.get_ttl("a").unwrap(), 0);
}

#[test]
fn test_import_replaces_rather_than_merges() {
    let dir = tempdir().unwrap();
    let store = open(&dir, StoreOptions::new());
    store.set("b", json!(2), Some(60_000)).unwrap();

    store.import_bulk(json!({"a": 1})).unwrap();

    assert_eq!(Value::Object(store.all().unwrap()), json!({"a": 1}));
    assert_eq!(store.get_ttl("b").unwrap(), 0);
}

#[test]
fn test_import_accepts_exported_envelopes() {
    let dir = tempdir().unwrap();
    let source = AlphaBase::open(
        dir.path().join("source.json"),
        StoreOptions::new()
            .with_cipher(CipherKind::Xor)
            .with_passphrase("shared secret"),
    )
    .unwrap();
    source.set("a", json!(1), Some(60_000)).unwrap();
    let alphabase_core::Exported::Text(text) = source.export_envelope(true).unwrap() else {
        panic!("expected text export");
    };
    assert!(text.contains("\"_encrypted\""));

    let target = AlphaBase::open(
        dir.path().join("target.json"),
        StoreOptions::new().with_passphrase("shared secret"),
    )
    .unwrap();
    target.set("old", json!(0), None).unwrap();
    target.import_bulk(Value::String(text)).unwrap();

    assert_eq!(target.keys().unwrap(), vec!["a".to_string()]);
    assert!(target.get_ttl("a").unwrap() > 0);
}

#[test]
fn test_import_rejects_arrays_and_keeps_state() {
    let dir = tempdir().unwrap();
    let store = open(&dir, StoreOptions::new());
    store.set("a", json!(1), None).unwrap();

    let err = store.import_bulk(json!([{"a": 2}])).unwrap_err();
    assert!(matches!(err, AlphaError::ImportFormat(_)));
    let err = store.import_bulk(json!("not json")).unwrap_err();
    assert!(matches!(err, AlphaError::ImportFormat(_)));

    assert_eq!(store.get("a").unwrap(), Some(json!(1)));
}

#[test]
fn test_wrong_passphrase_opens_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("secret.json");
    {
        let store = AlphaBase::open(
            &path,
            StoreOptions::new()
                .with_cipher(CipherKind::Aes)
                .with_passphrase("right passphrase"),
        )
        .unwrap();
        store.set("k", json!("v"), None).unwrap();
    }
    let raw = fs::read_to_string(&path).unwrap();
    assert!(!raw.contains("\"k\""));

    let wrong = AlphaBase::open(
        &path,
        StoreOptions::new()
            .with_cipher(CipherKind::Aes)
            .with_passphrase("wrong passphrase"),
    )
    .unwrap();
    assert!(wrong.all().unwrap().is_empty());

    let right = AlphaBase::open(
        &path,
        StoreOptions::new()
            .with_cipher(CipherKind::Aes)
            .with_passphrase("right passphrase"),
    )
    .unwrap();
    assert_eq!(right.get("k").unwrap(), Some(json!("v")));
}

#[test]
fn test_corrupt_file_opens_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    fs::write(&path, b"{\"data\": {\"a\": 1").unwrap();

    let store = AlphaBase::open(&path, StoreOptions::new()).unwrap();
    assert!(store.all().unwrap().is_empty());
}

#[test]
fn test_cipher_downgrade_without_passphrase() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    let options = || StoreOptions::new().with_cipher(CipherKind::Aes);

    let store = AlphaBase::open(&path, options()).unwrap();
    let status = store.encryption_status();
    assert!(status.downgraded());
    assert!(!status.encrypted_at_rest());
    store.set("plain", json!({"visible": true}), None).unwrap();
    drop(store);

    let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw, json!({"data": {"plain": {"visible": true}}, "ttlMeta": {}}));

    let reopened = AlphaBase::open(&path, options()).unwrap();
    assert_eq!(reopened.get("plain").unwrap(), Some(json!({"visible": true})));
}

#[test]
fn test_statistics_scenario() {
    let dir = tempdir().unwrap();
    let store = open(&dir, StoreOptions::new());
    store.set("a", json!(1), None).unwrap();
    store.set("bb", json!(22), None).unwrap();

    let stats = store.statistics().unwrap();

    assert_eq!(stats.total_keys, 2);
    assert_eq!(stats.largest_key_name.as_deref(), Some("bb"));
    assert!(stats.file_size_bytes > 0);
    assert!(stats.last_modified.is_some());
}

#[test]
fn test_schema_violation_leaves_state_unchanged() {
    let dir = tempdir().unwrap();
    let schema = JsonSchema::new(json!({
        "type": "object",
        "required": ["name"],
        "properties": {"name": {"type": "string"}}
    }))
    .unwrap();
    let store = open(&dir, StoreOptions::new().with_schema(schema));

    store.set("u1", json!({"name": "ada"}), None).unwrap();
    let err = store.set("u1", json!({"name": 7}), None).unwrap_err();

    match err {
        AlphaError::SchemaViolation { errors } => assert_eq!(errors.len(), 1),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.get("u1").unwrap(), Some(json!({"name": "ada"})));
}

#[test]
fn test_backup_does_not_touch_live_file() {
    let dir = tempdir().unwrap();
    let store = open(&dir, StoreOptions::new().with_backup_dir(dir.path().join("snapshots")));
    store.set("a", json!(1), None).unwrap();
    let live = fs::read(store.path()).unwrap();

    let backup = store.backup().unwrap();

    assert!(backup.starts_with(dir.path().join("snapshots")));
    assert_eq!(fs::read(store.path()).unwrap(), live);
    let copy = AlphaBase::open(&backup, StoreOptions::new()).unwrap();
    assert_eq!(copy.get("a").unwrap(), Some(json!(1)));
}

#[test]
fn test_sweep_persists_once() {
    let dir = tempdir().unwrap();
    let store = open(&dir, StoreOptions::new());
    for i in 0..5 {
        store.set(&format!("tmp{}", i), json!(i), Some(200)).unwrap();
    }
    store.set("keep", json!("x"), None).unwrap();

    let events = Arc::new(Mutex::new(Vec::<MutationEvent>::new()));
    let sink = Arc::clone(&events);
    store
        .subscribe(move |event: &MutationEvent| sink.lock().unwrap().push(event.clone()))
        .unwrap();

    thread::sleep(Duration::from_millis(300));
    assert_eq!(store.sweep().unwrap(), 5);

    let raw: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(raw["data"], json!({"keep": "x"}));
    assert_eq!(raw["ttlMeta"], json!({}));

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 5);
    assert!(events.iter().all(|e| e.kind == MutationKind::Expire));
}

#[test]
fn test_deferred_mode_flushes_on_demand() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    let store = AlphaBase::open(
        &path,
        StoreOptions::new().with_write_mode(WriteMode::Deferred(Duration::from_secs(3600))),
    )
    .unwrap();

    store.set("a", json!(1), None).unwrap();
    store.set("b", json!(2), None).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "{}");

    store.flush().unwrap();
    let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["data"], json!({"a": 1, "b": 2}));

    store.set("c", json!(3), None).unwrap();
    store.close().unwrap();
    let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["data"]["c"], json!(3));
}

#[test]
fn test_concurrent_writers_are_serialized() {
    let dir = tempdir().unwrap();
    let store = Arc::new(open(&dir, StoreOptions::new()));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..10 {
                    store.set(&format!("t{}-{}", t, i), json!(i), None).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.keys().unwrap().len(), 40);
    let reopened = AlphaBase::open(store.path(), StoreOptions::new()).unwrap();
    assert_eq!(reopened.keys().unwrap().len(), 40);
}

#[test]
fn test_failed_write_keeps_change_in_memory_until_flush() {
    let dir = tempdir().unwrap();
    let sub = dir.path().join("sub");
    let path = sub.join("store.json");
    let store = AlphaBase::open(&path, StoreOptions::new()).unwrap();
    store.set("before", json!(1), None).unwrap();

    // Make the parent a plain file so the next write cannot land.
    fs::remove_dir_all(&sub).unwrap();
    fs::write(&sub, b"not a directory").unwrap();

    let err = store.set("after", json!(2), None).unwrap_err();
    assert_eq!(err.kind(), alphabase_core::ErrorKind::Storage);
    assert_eq!(store.get("after").unwrap(), Some(json!(2)));
    assert_eq!(store.get("before").unwrap(), Some(json!(1)));

    fs::remove_file(&sub).unwrap();
    fs::create_dir(&sub).unwrap();
    store.flush().unwrap();
    drop(store);

    let reopened = AlphaBase::open(&path, StoreOptions::new()).unwrap();
    assert_eq!(reopened.get("after").unwrap(), Some(json!(2)));
    assert_eq!(reopened.get("before").unwrap(), Some(json!(1)));
}
