use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::verify::validate_address;
use crate::storage::{CacheData, GENERIC_CACHE_STORE};
use crate::utils::gen_random_string;
use crate::wallet::config::WALLET_NONCE_TTL;
use crate::wallet::errors::WalletError;

const NONCE_PREFIX: &str = "wallet_nonce";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredNonce {
    message: String,
    expires_at: DateTime<Utc>,
}

/// Issue a sign-in message containing a fresh nonce for a wallet address.
///
/// The message is what the wallet must sign; reissuing replaces any
/// previous nonce for the same address.
#[tracing::instrument(fields(address = %address))]
pub(crate) async fn issue_nonce(address: &str) -> Result<String, WalletError> {
    validate_address(address)?;

    let nonce = gen_random_string(16).map_err(|e| WalletError::Storage(e.to_string()))?;
    let message = format!("Sign this message to log in to Vetora: {nonce}");

    let record = StoredNonce {
        message: message.clone(),
        expires_at: Utc::now() + Duration::seconds(*WALLET_NONCE_TTL as i64),
    };
    let value = serde_json::to_string(&record).map_err(|e| WalletError::Storage(e.to_string()))?;

    GENERIC_CACHE_STORE
        .lock()
        .await
        .put_with_ttl(
            NONCE_PREFIX,
            &address.to_lowercase(),
            CacheData { value },
            *WALLET_NONCE_TTL as usize,
        )
        .await
        .map_err(|e| WalletError::Storage(e.to_string()))?;

    Ok(message)
}

/// Fetch and remove the outstanding sign-in message for an address.
///
/// Each nonce works exactly once; expired records count as absent.
pub(crate) async fn consume_nonce(address: &str) -> Result<String, WalletError> {
    let key = address.to_lowercase();
    let mut store = GENERIC_CACHE_STORE.lock().await;

    let data = store
        .get(NONCE_PREFIX, &key)
        .await
        .map_err(|e| WalletError::Storage(e.to_string()))?
        .ok_or(WalletError::NonceNotFound)?;

    store
        .remove(NONCE_PREFIX, &key)
        .await
        .map_err(|e| WalletError::Storage(e.to_string()))?;

    let record: StoredNonce =
        serde_json::from_str(&data.value).map_err(|e| WalletError::Storage(e.to_string()))?;

    if record.expires_at < Utc::now() {
        return Err(WalletError::NonceNotFound);
    }

    Ok(record.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_environment;
    use serial_test::serial;

    /// Test that a nonce round-trips and is single-use
    #[tokio::test]
    #[serial]
    async fn test_nonce_is_single_use() {
        init_test_environment().await;

        let address = "0xAbC0000000000000000000000000000000000001";
        let message = issue_nonce(address).await.expect("Issuing should succeed");
        assert!(message.contains("Sign this message"));

        // Lookup is case-insensitive on the address
        let consumed = consume_nonce(&address.to_uppercase().replace("0X", "0x"))
            .await
            .expect("Consuming should succeed");
        assert_eq!(consumed, message);

        let replay = consume_nonce(address).await;
        assert!(matches!(replay, Err(WalletError::NonceNotFound)));
    }

    /// Test that reissuing replaces the previous nonce
    #[tokio::test]
    #[serial]
    async fn test_reissue_replaces_nonce() {
        init_test_environment().await;

        let address = "0xabc0000000000000000000000000000000000002";
        let first = issue_nonce(address).await.expect("Issuing should succeed");
        let second = issue_nonce(address).await.expect("Reissuing should succeed");
        assert_ne!(first, second);

        let consumed = consume_nonce(address)
            .await
            .expect("Consuming should succeed");
        assert_eq!(consumed, second, "Only the latest nonce is valid");
    }
}
