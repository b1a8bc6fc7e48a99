//! Ed25519 signing primitives for manifests

use crate::exceptions::{DrvpackError, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

/// Generate an ephemeral Ed25519 key pair
pub fn generate_ephemeral_keypair() -> (SigningKey, VerifyingKey) {
    use rand::RngCore;
    let mut secret_key = [0u8; 32];
    OsRng.fill_bytes(&mut secret_key);
    let signing_key = SigningKey::from_bytes(&secret_key);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key)
}

/// Sign data with a signing key
pub fn sign_data(data: &[u8], signing_key: &SigningKey) -> Vec<u8> {
    let signature = signing_key.sign(data);
    signature.to_bytes().to_vec()
}

/// Verify a signature
pub fn verify_signature(data: &[u8], signature: &[u8], verifying_key: &VerifyingKey) -> bool {
    if let Ok(sig) = Signature::from_slice(signature) {
        verifying_key.verify(data, &sig).is_ok()
    } else {
        false
    }
}

/// Decode a hex verifying key as stored in `integrity.publicKey`
pub fn verifying_key_from_hex(hex_key: &str) -> Result<VerifyingKey> {
    let bytes = hex::decode(hex_key)
        .map_err(|e| DrvpackError::Signature(format!("public key is not hex: {e}")))?;
    let array: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| DrvpackError::Signature("public key must be 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&array).map_err(|e| DrvpackError::Signature(format!("invalid public key: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let (signing, verifying) = generate_ephemeral_keypair();
        let sig = sign_data(b"manifest", &signing);
        assert!(verify_signature(b"manifest", &sig, &verifying));
        assert!(!verify_signature(b"tampered", &sig, &verifying));
        assert!(!verify_signature(b"manifest", &sig[..10], &verifying));
    }

    #[test]
    fn test_verifying_key_hex_round_trip() {
        let (_, verifying) = generate_ephemeral_keypair();
        let decoded = verifying_key_from_hex(&hex::encode(verifying.as_bytes())).unwrap();
        assert_eq!(decoded, verifying);
        assert!(verifying_key_from_hex("zz").is_err());
        assert!(verifying_key_from_hex("abcd").is_err());
    }
}
