use crate::token::{TokenPair, refresh_token_pair, revoke_refresh_token};

use super::errors::CoordinationError;

/// Exchange a refresh token for a new token pair.
pub async fn refresh_tokens(refresh_token: &str) -> Result<TokenPair, CoordinationError> {
    let pair = refresh_token_pair(refresh_token).await?;
    Ok(pair)
}

/// Invalidate a refresh token on logout.
///
/// Logout never fails on a bad token; only a storage problem surfaces.
pub async fn logout(refresh_token: &str) -> Result<(), CoordinationError> {
    revoke_refresh_token(refresh_token).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_environment;
    use crate::token::{TokenError, issue_token_pair};
    use serial_test::serial;

    /// Test refresh then logout through the coordination layer
    #[tokio::test]
    #[serial]
    async fn test_refresh_and_logout() {
        init_test_environment().await;

        let pair = issue_token_pair("coord-token-user")
            .await
            .expect("Issuing should succeed");

        let new_pair = refresh_tokens(&pair.refresh_token)
            .await
            .expect("Refresh should succeed");

        logout(&new_pair.refresh_token)
            .await
            .expect("Logout should succeed");

        let result = refresh_tokens(&new_pair.refresh_token).await;
        assert!(matches!(
            result,
            Err(CoordinationError::TokenError(TokenError::Revoked))
        ));

        // Logout with garbage is tolerated
        logout("garbage").await.expect("Logout should not fail");
    }
}
