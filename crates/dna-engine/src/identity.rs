//! Identity creation, backup, and recovery wired through an engine's
//! configured paths and chunked layer (spec §4.4).

use dna_chunked::ChunkedLayer;
use dna_crypto::{sha3_512, sign_keypair, to_hex, KemKeypair, SignKeypair};
use dna_identity::{
    open_sealed_blob, publish_identity_backup, read_blob_from_disk, recover_from_dht,
    seal_identity, write_blob_to_disk, RawIdentityMaterial, Result as IdentityResult,
};

use crate::config::EngineConfig;

/// Generate a fresh ML-DSA-87 identity, seal it under `enc_keypair`'s
/// public key, persist it to `config.base_dir`, and publish the sealed
/// blob to the DHT (spec §4.4 steps 1-5). Returns the new fingerprint
/// alongside the signing keypair so the caller can use it immediately.
pub async fn create_and_backup_identity(
    config: &EngineConfig,
    chunked: &dyn ChunkedLayer,
    enc_keypair: &KemKeypair,
    cert: Vec<u8>,
) -> anyhow::Result<(String, SignKeypair)> {
    let sign_kp = sign_keypair();
    let fingerprint = to_hex(&sha3_512(&sign_kp.public_key));

    let material = RawIdentityMaterial {
        signing_secret_key: sign_kp.secret_key.clone(),
        cert,
    };
    let blob = seal_identity(&material, &enc_keypair.public_key)?;
    write_blob_to_disk(&config.base_dir, &fingerprint, &blob)?;
    publish_identity_backup(chunked, &fingerprint, &blob).await?;

    Ok((fingerprint, sign_kp))
}

/// Recover identity material, preferring the local sealed blob (same
/// device) and falling back to the DHT (spec §4.4 "Recovery"). A
/// tampered or wrong-key blob is a fatal `DecryptionFailed`, never
/// silently treated as absent.
pub async fn recover_identity(
    config: &EngineConfig,
    chunked: &dyn ChunkedLayer,
    fingerprint: &str,
    enc_keypair: &KemKeypair,
    cert_public_key: impl Fn(&[u8]) -> IdentityResult<Vec<u8>>,
) -> anyhow::Result<RawIdentityMaterial> {
    match read_blob_from_disk(&config.base_dir, fingerprint) {
        Ok(blob) => Ok(open_sealed_blob(&blob, &enc_keypair.secret_key)?),
        Err(_) => Ok(recover_from_dht(chunked, fingerprint, &enc_keypair.secret_key, cert_public_key).await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dna_chunked::InMemoryChunkedLayer;
    use pqcrypto_kyber::kyber1024;
    use pqcrypto_traits::kem::{PublicKey as _, SecretKey as _};
    use tempfile::tempdir;

    fn kem_keypair() -> KemKeypair {
        let (pk, sk) = kyber1024::keypair();
        KemKeypair {
            public_key: pk.as_bytes().to_vec(),
            secret_key: sk.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn create_then_recover_from_local_disk() {
        let dir = tempdir().unwrap();
        let config = EngineConfig {
            base_dir: dir.path().to_path_buf(),
            discovery: Default::default(),
        };
        let chunked = InMemoryChunkedLayer::new();
        let enc_kp = kem_keypair();

        let (fp, sign_kp) = create_and_backup_identity(&config, &chunked, &enc_kp, b"cert".to_vec())
            .await
            .unwrap();

        let recovered = recover_identity(&config, &chunked, &fp, &enc_kp, |cert| Ok(cert.to_vec()))
            .await
            .unwrap();
        assert_eq!(recovered.signing_secret_key, sign_kp.secret_key);
        assert_eq!(recovered.cert, b"cert".to_vec());
    }

    #[tokio::test]
    async fn recover_falls_back_to_dht_when_no_local_blob() {
        let creator_dir = tempdir().unwrap();
        let creator_config = EngineConfig {
            base_dir: creator_dir.path().to_path_buf(),
            discovery: Default::default(),
        };
        let chunked = InMemoryChunkedLayer::new();
        let enc_kp = kem_keypair();
        let (fp, sign_kp) =
            create_and_backup_identity(&creator_config, &chunked, &enc_kp, b"cert".to_vec())
                .await
                .unwrap();

        let new_device_dir = tempdir().unwrap();
        let new_device_config = EngineConfig {
            base_dir: new_device_dir.path().to_path_buf(),
            discovery: Default::default(),
        };
        let recovered = recover_identity(&new_device_config, &chunked, &fp, &enc_kp, |cert| Ok(cert.to_vec()))
            .await
            .unwrap();
        assert_eq!(recovered.signing_secret_key, sign_kp.secret_key);
    }
}
