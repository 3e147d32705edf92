//! Record codecs (C7, spec §4.6): DHT key derivation and the
//! canonical-JSON sign/verify path every record type in this crate shares.

use serde::Serialize;
use serde_json::{Map, Value};

use dna_crypto::{sha256, sign, to_hex, verify};

use crate::error::Result;

/// `dht_key(namespace) = hex(SHA-256(namespace))` (spec §3, §6). Pure and
/// deterministic: 64 lowercase hex chars every time.
pub fn dht_key(namespace: &str) -> String {
    to_hex(&sha256(namespace.as_bytes()))
}

/// Serialize `value` to canonical JSON: sorted keys, no insignificant
/// whitespace, with `omit_fields` (typically just `"signature"`) dropped
/// from the top-level object before serialization (spec §4.6).
pub fn canonical_bytes<T: Serialize>(value: &T, omit_fields: &[&str]) -> Result<Vec<u8>> {
    let mut json: Value = serde_json::to_value(value)?;
    if let Value::Object(ref mut map) = json {
        for field in omit_fields {
            map.remove(*field);
        }
    }
    Ok(serde_json::to_vec(&sort_object(json))?)
}

/// Sign `value`'s canonical form (with `omit_fields` dropped) under
/// `secret_key`.
pub fn sign_canonical<T: Serialize>(
    value: &T,
    omit_fields: &[&str],
    secret_key: &[u8],
) -> Result<Vec<u8>> {
    let bytes = canonical_bytes(value, omit_fields)?;
    Ok(sign(&bytes, secret_key)?)
}

/// Verify `signature` against `value`'s canonical form under `public_key`.
pub fn verify_canonical<T: Serialize>(
    value: &T,
    omit_fields: &[&str],
    signature: &[u8],
    public_key: &[u8],
) -> Result<bool> {
    let bytes = canonical_bytes(value, omit_fields)?;
    Ok(verify(signature, &bytes, public_key)?)
}

fn sort_object(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), sort_object(map[key].clone()));
            }
            Value::Object(sorted)
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(sort_object).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dht_key_is_stable_64_hex_lowercase() {
        let a = dht_key("dna:feeds:topic:abc");
        let b = dht_key("dna:feeds:topic:abc");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn different_namespaces_differ() {
        assert_ne!(dht_key("dna:feeds:topic:a"), dht_key("dna:feeds:topic:b"));
    }
}
