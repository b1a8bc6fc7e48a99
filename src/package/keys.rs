//! Manifest signing keys

use super::crypto::generate_ephemeral_keypair;
use crate::api::BuildOptions;
use crate::exceptions::{DrvpackError, Result};
use ed25519_dalek::{SigningKey, VerifyingKey};
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// PKCS#8 prefix of an Ed25519 private key (RFC 8410)
const PKCS8_PRIVATE_PREFIX: [u8; 16] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20,
];
/// SubjectPublicKeyInfo prefix of an Ed25519 public key
const SPKI_PUBLIC_PREFIX: [u8; 12] = [0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00];

/// Seed first, then PEM files, else an ephemeral pair
pub fn load_or_generate_keys(options: &BuildOptions) -> Result<(SigningKey, VerifyingKey)> {
    if let Some(ref seed) = options.key_seed {
        return Ok(generate_keys_from_seed(seed));
    }

    if let Some(ref private_path) = options.private_key_path {
        info!("🔑 Loading keys from files");
        return load_keys_from_files(private_path, options.public_key_path.as_deref());
    }

    warn!("⚠️ No keys provided, generating ephemeral keys (signature cannot be pinned)");
    Ok(generate_ephemeral_keypair())
}

/// Load keys from PEM files; the public key is derived when no file is given
pub fn load_keys_from_files(
    private_key_path: &Path,
    public_key_path: Option<&Path>,
) -> Result<(SigningKey, VerifyingKey)> {
    let private_bytes = read_pem_key(private_key_path, &["PRIVATE KEY", "ED25519 PRIVATE KEY"], &PKCS8_PRIVATE_PREFIX)?;
    let signing_key = SigningKey::from_bytes(&private_bytes);

    let verifying_key = match public_key_path {
        Some(path) => {
            let public_bytes = read_pem_key(path, &["PUBLIC KEY", "ED25519 PUBLIC KEY"], &SPKI_PUBLIC_PREFIX)?;
            let key = VerifyingKey::from_bytes(&public_bytes)
                .map_err(|e| DrvpackError::Signature(format!("Invalid public key: {e}")))?;
            if key != signing_key.verifying_key() {
                return Err(DrvpackError::Signature(
                    "Public key does not match private key".to_string(),
                ));
            }
            key
        }
        None => signing_key.verifying_key(),
    };

    debug!("✅ Loaded keys from files");
    Ok((signing_key, verifying_key))
}

/// Read a 32-byte key from a PEM file in raw or DER-wrapped form
fn read_pem_key(path: &Path, tags: &[&str], der_prefix: &[u8]) -> Result<[u8; 32]> {
    let text = fs::read_to_string(path)
        .map_err(|e| DrvpackError::Signature(format!("Failed to read {}: {e}", path.display())))?;
    let parsed = pem::parse(&text)
        .map_err(|e| DrvpackError::Signature(format!("Failed to parse PEM {}: {e}", path.display())))?;

    if !tags.contains(&parsed.tag()) {
        return Err(DrvpackError::Signature(format!(
            "Unsupported key type: {}",
            parsed.tag()
        )));
    }

    let contents = parsed.contents();
    let key = match contents.strip_prefix(der_prefix) {
        Some(rest) => rest,
        None => contents,
    };
    key.try_into()
        .map_err(|_| DrvpackError::Signature(format!("Invalid key length: {} bytes", key.len())))
}

/// Deterministic keys from a seed string (SHA-256 of the seed)
pub fn generate_keys_from_seed(seed: &str) -> (SigningKey, VerifyingKey) {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    let seed_bytes: [u8; 32] = hasher.finalize().into();

    let signing_key = SigningKey::from_bytes(&seed_bytes);
    let verifying_key = signing_key.verifying_key();

    let pub_hex = hex::encode(verifying_key.as_bytes());
    info!("🔑 Using seed-based key generation: fingerprint={}", &pub_hex[..16]);
    (signing_key, verifying_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pem::Pem;
    use tempfile::TempDir;

    #[test]
    fn test_seed_keys_are_deterministic() {
        let (a, _) = generate_keys_from_seed("release-2024");
        let (b, _) = generate_keys_from_seed("release-2024");
        let (c, _) = generate_keys_from_seed("other");
        assert_eq!(a.to_bytes(), b.to_bytes());
        assert_ne!(a.to_bytes(), c.to_bytes());
    }

    #[test]
    fn test_load_pkcs8_and_raw_pem() {
        let dir = TempDir::new().unwrap();
        let (signing, verifying) = generate_keys_from_seed("pem");

        let mut der = PKCS8_PRIVATE_PREFIX.to_vec();
        der.extend_from_slice(&signing.to_bytes());
        let private_path = dir.path().join("key.pem");
        fs::write(&private_path, pem::encode(&Pem::new("PRIVATE KEY", der))).unwrap();

        let public_path = dir.path().join("key.pub");
        fs::write(
            &public_path,
            pem::encode(&Pem::new("ED25519 PUBLIC KEY", verifying.to_bytes().to_vec())),
        )
        .unwrap();

        let (loaded, loaded_pub) = load_keys_from_files(&private_path, Some(&public_path)).unwrap();
        assert_eq!(loaded.to_bytes(), signing.to_bytes());
        assert_eq!(loaded_pub, verifying);

        let (_, derived) = load_keys_from_files(&private_path, None).unwrap();
        assert_eq!(derived, verifying);
    }

    #[test]
    fn test_mismatched_public_key_rejected() {
        let dir = TempDir::new().unwrap();
        let (signing, _) = generate_keys_from_seed("one");
        let (_, other) = generate_keys_from_seed("two");

        let private_path = dir.path().join("key.pem");
        fs::write(
            &private_path,
            pem::encode(&Pem::new("ED25519 PRIVATE KEY", signing.to_bytes().to_vec())),
        )
        .unwrap();
        let public_path = dir.path().join("key.pub");
        fs::write(
            &public_path,
            pem::encode(&Pem::new("PUBLIC KEY", other.to_bytes().to_vec())),
        )
        .unwrap();

        let err = load_keys_from_files(&private_path, Some(&public_path)).unwrap_err();
        assert!(matches!(err, DrvpackError::Signature(_)));
    }

    #[test]
    fn test_options_prefer_seed() {
        let options = BuildOptions {
            key_seed: Some("seeded".into()),
            private_key_path: Some("/nonexistent/key.pem".into()),
            ..Default::default()
        };
        let (_, verifying) = load_or_generate_keys(&options).unwrap();
        assert_eq!(verifying, generate_keys_from_seed("seeded").1);
    }
}
