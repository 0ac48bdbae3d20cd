use std::env;
use std::sync::LazyLock;

/// Signing secret for access tokens
pub(super) static JWT_ACCESS_SECRET: LazyLock<Vec<u8>> =
    LazyLock::new(|| match env::var("JWT_ACCESS_SECRET") {
        Ok(secret) => secret.into_bytes(),
        Err(_) => "default_access_secret_change_in_production"
            .to_string()
            .into_bytes(),
    });

/// Signing secret for refresh tokens, kept separate from the access secret
/// so that one cannot be replayed as the other
pub(super) static JWT_REFRESH_SECRET: LazyLock<Vec<u8>> =
    LazyLock::new(|| match env::var("JWT_REFRESH_SECRET") {
        Ok(secret) => secret.into_bytes(),
        Err(_) => "default_refresh_secret_change_in_production"
            .to_string()
            .into_bytes(),
    });

/// How long a refresh token stays valid in the server-side store, in seconds
pub(super) static REFRESH_TOKEN_TTL: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("REFRESH_TOKEN_TTL")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(2_592_000) // Default to 30 days if not set or invalid
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_token_ttl_default() {
        // The variable is not set in the test environment, so the default applies
        assert_eq!(*REFRESH_TOKEN_TTL, 2_592_000);
    }

    #[test]
    fn test_secrets_differ() {
        assert_ne!(*JWT_ACCESS_SECRET, *JWT_REFRESH_SECRET);
    }
}
