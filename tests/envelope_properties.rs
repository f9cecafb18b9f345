//! Property-based tests for the envelopes and canonical JSON.
//!
//! 1. **Round-trip**: every envelope form gives back the payload it was given
//! 2. **Multi-recipient**: any single recipient's key is enough
//! 3. **Tamper sensitivity**: flipping any bit of the IV, ciphertext, or tag
//!    fails authentication
//! 4. **Canonical form**: key order never matters, and canonicalizing is
//!    idempotent

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde_json::{Map, Value};
use spxp_crypto::{
    base64_decode, base64_encode,
    canonical::canonicalize,
    crypto::{
        base::{ConnectKeyPair, SymmetricKeySpec},
        compact::{decrypt_compact, encrypt_compact},
        message::{decrypt_asymmetric_json, decrypt_symmetric_json, encrypt_asymmetric_json, encrypt_symmetric_json},
        resource::{decrypt_resource, encrypt_resource},
    },
    error::Error,
};

fn flip_bit(encoded: &str, bit: usize) -> String {
    let mut bytes = base64_decode(encoded).unwrap();
    let idx = (bit / 8) % bytes.len();
    bytes[idx] ^= 1 << (bit % 8);
    base64_encode(&bytes)
}

/// Flat JSON objects with scalar values. Enough to shake out ordering bugs.
fn json_object() -> impl Strategy<Value = Vec<(String, Value)>> {
    let scalar = prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 \\n\"\\\\é]{0,12}".prop_map(Value::String),
        Just(Value::Null),
    ];
    prop::collection::btree_map("[a-z]{1,6}", scalar, 0..8).prop_map(|m| m.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_compact_roundtrip(payload in prop::collection::vec(any::<u8>(), 0..512), seed in any::<u64>()) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let key = SymmetricKeySpec::generate_with_random_id(&mut rng);
        let envelope = encrypt_compact(&mut rng, &payload, &key).unwrap();
        prop_assert_eq!(envelope.split('.').count(), 5);
        prop_assert_eq!(decrypt_compact(&envelope, &key).unwrap(), payload);
    }

    #[test]
    fn prop_symmetric_json_any_recipient(
        payload in prop::collection::vec(any::<u8>(), 0..512),
        seed in any::<u64>(),
        count in 1usize..5,
        pick in any::<prop::sample::Index>(),
    ) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let keys = (0..count).map(|i| SymmetricKeySpec::generate(&mut rng, format!("key-{}", i))).collect::<Vec<_>>();
        let envelope = encrypt_symmetric_json(&mut rng, &payload, &keys, None).unwrap();
        let only = pick.get(&keys);
        prop_assert_eq!(decrypt_symmetric_json(&envelope, only).unwrap(), payload);
        let stranger = SymmetricKeySpec::generate(&mut rng, "stranger");
        prop_assert!(decrypt_symmetric_json(&envelope, &stranger).unwrap_err().is_no_such_key());
    }

    #[test]
    fn prop_asymmetric_roundtrip(payload in prop::collection::vec(any::<u8>(), 0..512), seed in any::<u64>()) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let keypair = ConnectKeyPair::generate(&mut rng);
        let envelope = encrypt_asymmetric_json(&mut rng, &payload, &keypair.public_key()).unwrap();
        prop_assert_eq!(decrypt_asymmetric_json(&envelope, &keypair).unwrap(), payload);
    }

    #[test]
    fn prop_compact_tamper(payload in prop::collection::vec(any::<u8>(), 1..256), part in 2usize..5, bit in any::<usize>()) {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let key = SymmetricKeySpec::generate(&mut rng, "tamper");
        let envelope = encrypt_compact(&mut rng, &payload, &key).unwrap();
        let mut parts = envelope.split('.').map(String::from).collect::<Vec<_>>();
        parts[part] = flip_bit(&parts[part], bit);
        prop_assert_eq!(decrypt_compact(&parts.join("."), &key), Err(Error::CryptoOpenFailed));
    }

    #[test]
    fn prop_json_tamper(
        payload in prop::collection::vec(any::<u8>(), 1..256),
        field in prop::sample::select(vec!["iv", "ciphertext", "tag"]),
        bit in any::<usize>(),
        asymmetric in any::<bool>(),
    ) {
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let key = SymmetricKeySpec::generate(&mut rng, "tamper");
        let keypair = ConnectKeyPair::generate(&mut rng);
        let envelope = if asymmetric {
            encrypt_asymmetric_json(&mut rng, &payload, &keypair.public_key()).unwrap()
        } else {
            encrypt_symmetric_json(&mut rng, &payload, &[key.clone()], None).unwrap()
        };
        let mut obj: Map<String, Value> = serde_json::from_str(&envelope).unwrap();
        let flipped = flip_bit(obj[field].as_str().unwrap(), bit);
        obj.insert(field.into(), Value::String(flipped));
        let tampered = Value::Object(obj).to_string();
        let res = if asymmetric {
            decrypt_asymmetric_json(&tampered, &keypair)
        } else {
            decrypt_symmetric_json(&tampered, &key)
        };
        prop_assert_eq!(res, Err(Error::CryptoOpenFailed));
    }

    #[test]
    fn prop_resource_roundtrip(payload in prop::collection::vec(any::<u8>(), 0..10000), seed in any::<u64>()) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut ciphertext = Vec::new();
        let descriptor = encrypt_resource(&mut rng, payload.as_slice(), &mut ciphertext, None).unwrap();
        prop_assert_eq!(ciphertext.len(), payload.len());
        let mut plaintext = Vec::new();
        decrypt_resource(ciphertext.as_slice(), &mut plaintext, &descriptor).unwrap();
        prop_assert_eq!(plaintext, payload);
    }

    #[test]
    fn prop_canonical_ignores_key_order(entries in json_object()) {
        let forward = entries.iter().cloned().collect::<Map<String, Value>>();
        let backward = entries.iter().rev().cloned().collect::<Map<String, Value>>();
        let one = canonicalize(&Value::Object(forward), &[]);
        let two = canonicalize(&Value::Object(backward), &[]);
        prop_assert_eq!(&one, &two);

        let reparsed: Value = serde_json::from_str(&one).unwrap();
        prop_assert_eq!(canonicalize(&reparsed, &[]), one);
    }
}
