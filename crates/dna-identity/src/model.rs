//! Unified identity record (C10, spec §3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use dna_crypto::{sha3_512, sign, to_hex, verify};

use crate::error::{IdentityError, Result};

const SECONDS_PER_YEAR: u64 = 365 * 86_400;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisteredName {
    pub name: String,
    pub registered_at: u64,
    pub expires_at: u64,
}

impl RegisteredName {
    pub fn new(name: String, registered_at: u64) -> Self {
        Self {
            name,
            registered_at,
            expires_at: registered_at + SECONDS_PER_YEAR,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub display_name: String,
    pub bio: String,
    pub avatar_hash: String,
    pub location: String,
    pub website: String,
    /// Chain name -> wallet address.
    pub wallets: HashMap<String, String>,
    /// Platform name -> handle.
    pub socials: HashMap<String, String>,
}

/// The unified identity record (spec §3). `signature` covers the canonical
/// JSON serialization of every other field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub fingerprint: String,
    pub signing_public_key: Vec<u8>,
    pub encryption_public_key: Vec<u8>,
    pub name: Option<RegisteredName>,
    pub profile: Profile,
    pub created_at: u64,
    pub updated_at: u64,
    pub version: u64,
    pub signature: Vec<u8>,
}

impl Identity {
    /// Build and sign a fresh identity. `now` is injected so tests stay
    /// deterministic.
    pub fn new(
        signing_public_key: Vec<u8>,
        encryption_public_key: Vec<u8>,
        signing_secret_key: &[u8],
        profile: Profile,
        name: Option<RegisteredName>,
        now: u64,
    ) -> Result<Self> {
        let fingerprint = to_hex(&sha3_512(&signing_public_key));
        let mut identity = Identity {
            fingerprint,
            signing_public_key,
            encryption_public_key,
            name,
            profile,
            created_at: now,
            updated_at: now,
            version: 1,
            signature: Vec::new(),
        };
        identity.resign(signing_secret_key)?;
        Ok(identity)
    }

    /// Re-derive the fingerprint, bump `updated_at`/`version`, and
    /// re-sign. Used for profile edits and name registration.
    pub fn republish(&mut self, signing_secret_key: &[u8], now: u64) -> Result<()> {
        if now < self.updated_at {
            return Err(IdentityError::Config(
                "republish timestamp must not move backwards".into(),
            ));
        }
        self.updated_at = now;
        self.version += 1;
        self.resign(signing_secret_key)
    }

    fn resign(&mut self, signing_secret_key: &[u8]) -> Result<()> {
        let unsigned = self.canonical_unsigned_bytes()?;
        self.signature = sign(&unsigned, signing_secret_key)?;
        Ok(())
    }

    /// Canonical JSON of every field except `signature`, with stable
    /// (sorted) key ordering and no insignificant whitespace (spec §4.6).
    pub fn canonical_unsigned_bytes(&self) -> Result<Vec<u8>> {
        let mut value: Value = serde_json::to_value(self)?;
        if let Value::Object(ref mut map) = value {
            map.remove("signature");
        }
        Ok(serde_json::to_vec(&sort_object(value))?)
    }

    /// Verify `signature` against `signing_public_key`, and check the
    /// structural invariants from spec §3.
    pub fn verify(&self) -> Result<bool> {
        if self.fingerprint != to_hex(&sha3_512(&self.signing_public_key)) {
            return Ok(false);
        }
        if self.updated_at < self.created_at {
            return Ok(false);
        }
        if let Some(name) = &self.name {
            if name.expires_at != name.registered_at + SECONDS_PER_YEAR {
                return Ok(false);
            }
        }
        let unsigned = self.canonical_unsigned_bytes()?;
        Ok(verify(&self.signature, &unsigned, &self.signing_public_key)?)
    }
}

/// Recursively re-sort JSON object keys (serde_json's default `Map` is a
/// `BTreeMap` already, but nested objects constructed ad hoc may not be —
/// this makes the guarantee explicit and independent of serde_json's
/// `preserve_order` feature being off.
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
    use dna_crypto::sign_keypair as pq_sign_keypair;

    #[test]
    fn roundtrip_sign_verify() {
        let kp = pq_sign_keypair();
        let enc_kp_pk = vec![1u8; dna_crypto::KEM_PUBLIC_KEY_BYTES];
        let identity = Identity::new(
            kp.public_key.clone(),
            enc_kp_pk,
            &kp.secret_key,
            Profile::default(),
            None,
            1_000,
        )
        .unwrap();
        assert!(identity.verify().unwrap());
        assert_eq!(identity.fingerprint.len(), 128);
    }

    #[test]
    fn tampering_profile_invalidates_signature() {
        let kp = pq_sign_keypair();
        let enc_pk = vec![2u8; dna_crypto::KEM_PUBLIC_KEY_BYTES];
        let mut identity = Identity::new(
            kp.public_key.clone(),
            enc_pk,
            &kp.secret_key,
            Profile::default(),
            None,
            1_000,
        )
        .unwrap();
        identity.profile.bio = "tampered after signing".into();
        assert!(!identity.verify().unwrap());
    }

    #[test]
    fn name_expiry_invariant() {
        let name = RegisteredName::new("alice".into(), 1_000);
        assert_eq!(name.expires_at, 1_000 + SECONDS_PER_YEAR);
    }

    #[test]
    fn republish_rejects_time_moving_backwards() {
        let kp = pq_sign_keypair();
        let enc_pk = vec![3u8; dna_crypto::KEM_PUBLIC_KEY_BYTES];
        let mut identity = Identity::new(
            kp.public_key.clone(),
            enc_pk,
            &kp.secret_key,
            Profile::default(),
            None,
            2_000,
        )
        .unwrap();
        assert!(identity.republish(&kp.secret_key, 1_000).is_err());
        assert!(identity.republish(&kp.secret_key, 3_000).is_ok());
    }
}
