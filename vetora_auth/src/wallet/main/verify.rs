use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::wallet::errors::WalletError;

/// Verify an EIP-191 personal-sign signature over `message` and check that
/// the recovered signer matches `address`.
///
/// Signatures are the usual 65-byte `r || s || v` form produced by
/// `personal_sign`, hex encoded with an optional `0x` prefix.
pub(crate) fn verify_wallet_signature(
    address: &str,
    message: &str,
    signature: &str,
) -> Result<(), WalletError> {
    validate_address(address)?;

    let sig_bytes = hex::decode(signature.trim_start_matches("0x"))
        .map_err(|e| WalletError::InvalidSignature(e.to_string()))?;
    if sig_bytes.len() != 65 {
        return Err(WalletError::InvalidSignature(format!(
            "Expected 65 bytes, got {}",
            sig_bytes.len()
        )));
    }

    let signature = Signature::from_slice(&sig_bytes[..64])
        .map_err(|e| WalletError::InvalidSignature(e.to_string()))?;

    // Wallets emit v as 27/28, raw recovery ids are 0/1
    let v = sig_bytes[64];
    let recovery_id = RecoveryId::try_from(if v >= 27 { v - 27 } else { v })
        .map_err(|e| WalletError::InvalidSignature(e.to_string()))?;

    let digest = eip191_hash(message.as_bytes());
    let verifying_key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
        .map_err(|e| WalletError::InvalidSignature(e.to_string()))?;

    let recovered = derive_address(&verifying_key);
    if recovered != address.to_lowercase() {
        return Err(WalletError::InvalidSignature(
            "Recovered address does not match".to_string(),
        ));
    }

    Ok(())
}

pub(super) fn validate_address(address: &str) -> Result<(), WalletError> {
    let hex_part = address
        .strip_prefix("0x")
        .ok_or_else(|| WalletError::InvalidAddress(address.to_string()))?;
    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WalletError::InvalidAddress(address.to_string()));
    }
    Ok(())
}

/// Keccak-256 of the message with the `personal_sign` prefix applied.
fn eip191_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()));
    hasher.update(message);
    hasher.finalize().into()
}

/// Lowercase hex address for a secp256k1 public key, i.e. the last 20
/// bytes of the Keccak-256 hash of the uncompressed key without its tag.
fn derive_address(key: &VerifyingKey) -> String {
    let uncompressed = key.to_encoded_point(false);
    let hash = Keccak256::digest(&uncompressed.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}
