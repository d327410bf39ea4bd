//! # kernel-crypto — canonical encoding and content hashing
//!
//! Every other crate that needs a stable hash over a structured value (the
//! ledger's `state_hash`/`action_hash`/`entry_hash`, the tool replay store's
//! `action_id`, the LLM replay store's `request_hash`/`chain_hash`) goes
//! through this crate so they all agree on one encoding.
//!
//! ## Design principle
//!
//! Canonicalization is pure: no I/O, no clock, no randomness. The same
//! [`serde_json::Value`] always canonicalizes to the same bytes, on any
//! platform, in any process.
//!
//! This crate intentionally depends on `serde_json::Map`'s default
//! `BTreeMap` backing (the `preserve_order` feature is never enabled
//! anywhere in this workspace) — that ordering guarantee is what makes
//! [`canonical_bytes`] deterministic without a hand-rolled key sort.

#![deny(missing_docs)]

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

/// The all-zero hash used as `prev_entry_hash` for the first ledger entry.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Encode `value` as deterministic bytes: sorted object keys, no
/// insignificant whitespace, minimal separators.
///
/// `serde_json::Value`'s arrays preserve caller-supplied order — callers
/// that need "sets as sorted sequences" (spec §4.A) must sort their
/// `Vec`/`BTreeSet` into the `Value` before calling this, since a JSON
/// value alone cannot distinguish a set from a list.
#[must_use]
pub fn canonical_bytes(value: &serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(value).expect("serde_json::Value always serializes")
}

/// Canonicalize any `Serialize` value by first converting it to
/// [`serde_json::Value`], then encoding that canonically.
///
/// # Errors
///
/// Returns an error if `value` cannot be represented as a `serde_json::Value`
/// (e.g. a map with non-string keys, or a `NaN`/`Infinity` float).
pub fn canonicalize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let as_value = serde_json::to_value(value)?;
    Ok(canonical_bytes(&as_value))
}

/// Lowercase-hex SHA-256 digest of raw bytes.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex::encode(digest)
}

/// Lowercase-hex SHA-256 digest of a value's canonical encoding.
///
/// # Errors
///
/// Propagates [`canonicalize`]'s error.
pub fn sha256_of<T: serde::Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(&canonicalize(value)?))
}

/// Lowercase-hex HMAC-SHA256 of raw bytes under `secret`.
#[must_use]
pub fn hmac_sha256_hex(secret: &[u8], data: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn genesis_hash_is_sixty_four_zero_hex_chars() {
        assert_eq!(GENESIS_HASH.len(), 64);
        assert!(GENESIS_HASH.chars().all(|c| c == '0'));
    }

    #[test]
    fn object_keys_canonicalize_in_sorted_order_regardless_of_insertion_order() {
        let a = json!({"b": 1, "a": 2, "c": 3});
        let b = json!({"c": 3, "a": 2, "b": 1});
        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
        assert_eq!(canonical_bytes(&a), br#"{"a":2,"b":1,"c":3}"#);
    }

    #[test]
    fn canonical_bytes_has_no_insignificant_whitespace() {
        let value = json!({"nested": {"x": [1, 2, 3]}});
        let bytes = canonical_bytes(&value);
        assert!(!bytes.contains(&b' '));
    }

    #[test]
    fn canonicalize_round_trips_through_deserialize() {
        let value = json!({"z": "last", "a": "first", "nested": {"k": [3, 1, 2]}});
        let bytes = canonicalize(&value).unwrap();
        let reparsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(canonical_bytes(&reparsed), bytes);
    }

    #[test]
    fn sha256_of_is_deterministic_and_key_order_independent() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(sha256_of(&a).unwrap(), sha256_of(&b).unwrap());
        assert_eq!(sha256_of(&a).unwrap().len(), 64);
    }

    #[test]
    fn hmac_changes_with_secret() {
        let data = b"entry-core-bytes";
        let h1 = hmac_sha256_hex(b"secret-a", data);
        let h2 = hmac_sha256_hex(b"secret-b", data);
        assert_ne!(h1, h2);
        assert_eq!(h1.len(), 64);
    }
}
