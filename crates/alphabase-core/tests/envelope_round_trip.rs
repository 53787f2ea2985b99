use alphabase_core::crypto::{CipherKind, KeyCache};
use alphabase_core::storage::envelope::{decode_on_open, encode_for_save};
use alphabase_core::storage::{Snapshot, TtlMeta};
use proptest::prelude::*;
use serde_json::{Map, Value};

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        any::<f64>()
            .prop_filter("JSON numbers are finite", |f| f.is_finite())
            .prop_map(Value::from),
        "[a-zA-Z0-9 éü_-]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            proptest::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|entries| Value::Object(entries.into_iter().collect())),
        ]
    })
}

fn arb_snapshot() -> impl Strategy<Value = Snapshot> {
    (
        proptest::collection::btree_map("[a-z_]{1,8}", arb_json(), 0..6),
        proptest::collection::vec(("[a-z]{1,8}", 0i64..4_000_000_000_000), 0..4),
        proptest::collection::vec(("[a-z]{1,8}", "[a-z0-9]{1,8}", 0i64..4_000_000_000_000), 0..4),
    )
        .prop_map(|(data, key_ttls, doc_ttls)| {
            let data: Map<String, Value> = data.into_iter().collect();
            let mut ttl = TtlMeta::new();
            for (collection, doc_id, at) in doc_ttls {
                ttl.set_document(&collection, &doc_id, at);
            }
            for (key, at) in key_ttls {
                ttl.set_key(&key, at);
            }
            Snapshot::new(data, ttl)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_keyless_ciphers_round_trip(snapshot in arb_snapshot()) {
        let keys = KeyCache::new();
        for cipher in [CipherKind::None, CipherKind::Base64] {
            let text = encode_for_save(&snapshot, None, cipher, &keys).unwrap();
            let decoded = decode_on_open(text.as_bytes(), None, cipher, &keys);
            prop_assert_eq!(&decoded, &snapshot, "cipher {}", cipher);
        }
    }

    #[test]
    fn prop_passphrase_ciphers_round_trip(
        snapshot in arb_snapshot(),
        passphrase in "[ -~]{1,24}",
    ) {
        let keys = KeyCache::new();
        for cipher in [CipherKind::Xor, CipherKind::Aes] {
            let text = encode_for_save(&snapshot, Some(&passphrase), cipher, &keys).unwrap();
            let decoded = decode_on_open(text.as_bytes(), Some(&passphrase), CipherKind::None, &keys);
            prop_assert_eq!(&decoded, &snapshot, "cipher {}", cipher);
        }
    }

    #[test]
    fn prop_downgraded_save_reads_back_without_passphrase(snapshot in arb_snapshot()) {
        let keys = KeyCache::new();
        let text = encode_for_save(&snapshot, None, CipherKind::Aes, &keys).unwrap();
        let decoded = decode_on_open(text.as_bytes(), None, CipherKind::Aes, &keys);
        prop_assert_eq!(decoded, snapshot);
    }
}

#[test]
fn test_age_round_trip() {
    let keys = KeyCache::new();
    let mut snapshot = Snapshot::default();
    snapshot
        .data
        .insert("secret".to_string(), serde_json::json!({"pin": 1234}));

    let text = encode_for_save(&snapshot, Some("age passphrase"), CipherKind::Age, &keys).unwrap();
    assert!(!text.contains("1234"));

    let decoded = decode_on_open(text.as_bytes(), Some("age passphrase"), CipherKind::None, &keys);
    assert_eq!(decoded, snapshot);

    let wrong = decode_on_open(text.as_bytes(), Some("other passphrase"), CipherKind::Age, &keys);
    assert_eq!(wrong, Snapshot::default());
}

#[test]
fn test_floats_keep_every_bit() {
    let keys = KeyCache::new();
    let mut snapshot = Snapshot::default();
    for (key, number) in [("tiny", 1.0715660391465826e-75), ("third", 1.0 / 3.0), ("big", 1.7976931348623157e308)] {
        snapshot.data.insert(key.to_string(), serde_json::json!({ "f": number }));
    }

    for cipher in [CipherKind::None, CipherKind::Base64] {
        let text = encode_for_save(&snapshot, None, cipher, &keys).unwrap();
        let decoded = decode_on_open(text.as_bytes(), None, cipher, &keys);
        assert_eq!(decoded, snapshot, "cipher {}", cipher);
        assert_eq!(decoded.data["tiny"]["f"].as_f64(), Some(1.0715660391465826e-75));
    }
}
