use std::sync::LazyLock;

/// How long a wallet sign-in nonce stays valid, in seconds
pub(super) static WALLET_NONCE_TTL: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("WALLET_NONCE_TTL")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(300)
});
