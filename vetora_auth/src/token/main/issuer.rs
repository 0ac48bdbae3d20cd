use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::storage::{CacheData, GENERIC_CACHE_STORE};
use crate::utils::gen_random_string;

use super::super::config::{JWT_ACCESS_SECRET, JWT_REFRESH_SECRET, REFRESH_TOKEN_TTL};
use super::super::errors::TokenError;
use super::super::types::{AccessClaims, RefreshClaims, StoredRefreshToken, TokenPair};

const REFRESH_TOKEN_PREFIX: &str = "refresh_token";

/// Validation settings for tokens that carry no `exp` claim.
///
/// Tokens are revoked by rotating the signing secret (access) or by
/// removing the server-side record (refresh), not by expiry.
fn no_exp_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    validation
}

/// Issue a fresh access/refresh token pair for a user.
///
/// The refresh token is recorded server-side under its `jti`; a refresh
/// token whose record is missing is treated as revoked.
#[tracing::instrument(fields(user_id = %user_id))]
pub(crate) async fn issue_token_pair(user_id: &str) -> Result<TokenPair, TokenError> {
    let access_claims = AccessClaims {
        user_id: user_id.to_string(),
    };
    let access_token = encode(
        &Header::default(),
        &access_claims,
        &EncodingKey::from_secret(&JWT_ACCESS_SECRET),
    )
    .map_err(|e| TokenError::Invalid(e.to_string()))?;

    let jti = gen_random_string(32).map_err(|e| TokenError::Storage(e.to_string()))?;
    let refresh_claims = RefreshClaims {
        user_id: user_id.to_string(),
        jti: jti.clone(),
    };
    let refresh_token = encode(
        &Header::default(),
        &refresh_claims,
        &EncodingKey::from_secret(&JWT_REFRESH_SECRET),
    )
    .map_err(|e| TokenError::Invalid(e.to_string()))?;

    store_refresh_record(&jti, user_id).await?;

    tracing::debug!(jti = %jti, "Issued token pair");
    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Verify an access token and return its claims.
pub(crate) fn verify_access_token(token: &str) -> Result<AccessClaims, TokenError> {
    let data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(&JWT_ACCESS_SECRET),
        &no_exp_validation(),
    )
    .map_err(|e| TokenError::Invalid(e.to_string()))?;

    Ok(data.claims)
}

/// Exchange a refresh token for a new token pair.
///
/// The old refresh token is consumed: its server-side record is removed
/// and a new pair is issued, so each refresh token works exactly once.
#[tracing::instrument(skip(refresh_token))]
pub(crate) async fn refresh_token_pair(refresh_token: &str) -> Result<TokenPair, TokenError> {
    let data = decode::<RefreshClaims>(
        refresh_token,
        &DecodingKey::from_secret(&JWT_REFRESH_SECRET),
        &no_exp_validation(),
    )
    .map_err(|e| TokenError::Invalid(e.to_string()))?;
    let claims = data.claims;

    let record = take_refresh_record(&claims.jti).await?;
    let record = record.ok_or(TokenError::Revoked)?;

    if record.user_id != claims.user_id {
        return Err(TokenError::Invalid(
            "Refresh token does not match its record".to_string(),
        ));
    }
    if record.expires_at < Utc::now() {
        return Err(TokenError::Expired);
    }

    issue_token_pair(&claims.user_id).await
}

/// Revoke a refresh token so it can no longer be exchanged.
///
/// A token that is malformed or already revoked is ignored; logout
/// always succeeds from the client's point of view.
pub(crate) async fn revoke_refresh_token(refresh_token: &str) -> Result<(), TokenError> {
    let data = match decode::<RefreshClaims>(
        refresh_token,
        &DecodingKey::from_secret(&JWT_REFRESH_SECRET),
        &no_exp_validation(),
    ) {
        Ok(data) => data,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unverifiable refresh token on logout");
            return Ok(());
        }
    };

    GENERIC_CACHE_STORE
        .lock()
        .await
        .remove(REFRESH_TOKEN_PREFIX, &data.claims.jti)
        .await
        .map_err(|e| TokenError::Storage(e.to_string()))
}

async fn store_refresh_record(jti: &str, user_id: &str) -> Result<(), TokenError> {
    let record = StoredRefreshToken {
        user_id: user_id.to_string(),
        expires_at: Utc::now() + Duration::seconds(*REFRESH_TOKEN_TTL as i64),
    };
    let value = serde_json::to_string(&record).map_err(|e| TokenError::Storage(e.to_string()))?;

    GENERIC_CACHE_STORE
        .lock()
        .await
        .put_with_ttl(
            REFRESH_TOKEN_PREFIX,
            jti,
            CacheData { value },
            *REFRESH_TOKEN_TTL as usize,
        )
        .await
        .map_err(|e| TokenError::Storage(e.to_string()))
}

/// Fetch and remove the server-side record for a refresh token.
async fn take_refresh_record(jti: &str) -> Result<Option<StoredRefreshToken>, TokenError> {
    let mut store = GENERIC_CACHE_STORE.lock().await;

    let Some(data) = store
        .get(REFRESH_TOKEN_PREFIX, jti)
        .await
        .map_err(|e| TokenError::Storage(e.to_string()))?
    else {
        return Ok(None);
    };

    store
        .remove(REFRESH_TOKEN_PREFIX, jti)
        .await
        .map_err(|e| TokenError::Storage(e.to_string()))?;

    let record: StoredRefreshToken =
        serde_json::from_str(&data.value).map_err(|e| TokenError::Storage(e.to_string()))?;
    Ok(Some(record))
}
