use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::storage::{CacheData, GENERIC_CACHE_STORE};

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Jwk {
    kty: String,
    kid: String,
    alg: Option<String>,
    n: Option<String>,
    e: Option<String>,
    x: Option<String>,
    y: Option<String>,
}

/// Claims shared by the Google and Apple id tokens we consume.
#[derive(Debug, Deserialize, Clone)]
pub(super) struct IdClaims {
    pub(super) iss: String,
    pub(super) sub: String,
    pub(super) aud: String,
    pub(super) email: Option<String>,
    email_verified: Option<serde_json::Value>,
    pub(super) name: Option<String>,
    pub(super) iat: i64,
    pub(super) exp: i64,
    pub(super) nbf: Option<i64>,
}

impl IdClaims {
    /// Apple encodes email_verified as the string "true"; Google uses a
    /// boolean.
    pub(super) fn email_verified(&self) -> bool {
        match &self.email_verified {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s == "true",
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum TokenVerificationError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Base64 decoding failed: {0}")]
    Base64Error(#[from] base64::DecodeError),
    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
    #[error("Invalid token format")]
    InvalidTokenFormat,
    #[error("Invalid token signature")]
    InvalidTokenSignature,
    #[error("Invalid token audience, expected: {0}, actual: {1}")]
    InvalidTokenAudience(String, String),
    #[error("Invalid token issuer: {0}")]
    InvalidTokenIssuer(String),
    #[error("Token expired")]
    TokenExpired,
    #[error("Token not yet valid, now: {0}, iat: {1}")]
    TokenNotYetValid(u64, u64),
    #[error("No matching key found in JWKS")]
    NoMatchingKey,
    #[error("Missing key component: {0}")]
    MissingKeyComponent(String),
    #[error("Unsupported algorithm: {0:?}")]
    UnsupportedAlgorithm(Algorithm),
    #[error("JWKS parsing error: {0}")]
    JwksParsing(String),
    #[error("JWKS fetch error: {0}")]
    JwksFetch(String),
    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

const CACHE_EXPIRATION: Duration = Duration::from_secs(600);

#[derive(Serialize, Deserialize, Clone, Debug)]
struct JwksCache {
    jwks: Jwks,
    expires_at: DateTime<Utc>,
}

impl From<JwksCache> for CacheData {
    fn from(cache: JwksCache) -> Self {
        Self {
            value: serde_json::to_string(&cache).unwrap_or_default(),
        }
    }
}

impl TryFrom<CacheData> for JwksCache {
    type Error = TokenVerificationError;

    fn try_from(cache_data: CacheData) -> Result<Self, Self::Error> {
        serde_json::from_str(&cache_data.value)
            .map_err(|e| TokenVerificationError::JwksParsing(format!("{e}")))
    }
}

async fn fetch_jwks(jwks_url: &str) -> Result<Jwks, TokenVerificationError> {
    // Try to get from cache first
    let prefix = "jwks";
    let cache_key = jwks_url;

    if let Some(cached) = GENERIC_CACHE_STORE
        .lock()
        .await
        .get(prefix, cache_key)
        .await
        .map_err(|e| TokenVerificationError::JwksFetch(format!("Cache error: {e}")))?
    {
        let jwks_cache: JwksCache = cached.try_into()?;

        if jwks_cache.expires_at > Utc::now() {
            tracing::debug!("Returning valid cached JWKs");
            return Ok(jwks_cache.jwks);
        }

        tracing::debug!("Removing expired JWKs from cache");
        GENERIC_CACHE_STORE
            .lock()
            .await
            .remove(prefix, cache_key)
            .await
            .map_err(|e| TokenVerificationError::JwksFetch(format!("Cache error: {e}")))?;
    }

    // If not in cache, fetch from the URL
    let resp = reqwest::get(jwks_url).await?;
    let jwks: Jwks = resp.json().await?;
    tracing::debug!("JWKs fetched from URL");

    let jwks_cache = JwksCache {
        jwks: jwks.clone(),
        expires_at: Utc::now() + CACHE_EXPIRATION,
    };

    GENERIC_CACHE_STORE
        .lock()
        .await
        .put_with_ttl(
            prefix,
            cache_key,
            jwks_cache.into(),
            CACHE_EXPIRATION.as_secs() as usize,
        )
        .await
        .map_err(|e| TokenVerificationError::JwksFetch(format!("Cache error: {e}")))?;

    Ok(jwks)
}

fn find_jwk<'a>(jwks: &'a Jwks, kid: &str) -> Option<&'a Jwk> {
    jwks.keys.iter().find(|key| key.kid == kid)
}

fn convert_jwk_to_decoding_key(
    jwk: &Jwk,
    alg: Algorithm,
) -> Result<DecodingKey, TokenVerificationError> {
    match alg {
        Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => {
            let n = jwk
                .n
                .as_deref()
                .ok_or(TokenVerificationError::MissingKeyComponent("n".to_string()))?;
            let e = jwk
                .e
                .as_deref()
                .ok_or(TokenVerificationError::MissingKeyComponent("e".to_string()))?;
            Ok(DecodingKey::from_rsa_components(n, e)?)
        }
        Algorithm::ES256 | Algorithm::ES384 => {
            let x = jwk
                .x
                .as_deref()
                .ok_or(TokenVerificationError::MissingKeyComponent("x".to_string()))?;
            let y = jwk
                .y
                .as_deref()
                .ok_or(TokenVerificationError::MissingKeyComponent("y".to_string()))?;
            Ok(DecodingKey::from_ec_components(x, y)?)
        }
        alg => Err(TokenVerificationError::UnsupportedAlgorithm(alg)),
    }
}

fn decode_claims(token: &str) -> Result<IdClaims, TokenVerificationError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(TokenVerificationError::InvalidTokenFormat);
    }
    let decoded_payload = URL_SAFE_NO_PAD.decode(parts[1])?;
    let claims: IdClaims = serde_json::from_slice(&decoded_payload)?;
    Ok(claims)
}

fn verify_signature(
    token: &str,
    decoding_key: &DecodingKey,
    alg: Algorithm,
) -> Result<bool, TokenVerificationError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(TokenVerificationError::InvalidTokenFormat);
    }

    let message = format!("{}.{}", parts[0], parts[1]);

    match jsonwebtoken::crypto::verify(parts[2], message.as_bytes(), decoding_key, alg) {
        Ok(valid) => Ok(valid),
        Err(err) => Err(TokenVerificationError::from(err)),
    }
}

/// Verify a provider id token: signature against the provider JWKS,
/// then audience, issuer and time-window claims.
pub(super) async fn verify_idtoken(
    token: &str,
    jwks_url: &str,
    issuers: &[&str],
    audience: &str,
) -> Result<IdClaims, TokenVerificationError> {
    let header = jsonwebtoken::decode_header(token)?;

    let kid = header
        .kid
        .ok_or(TokenVerificationError::MissingKeyComponent(
            "kid".to_string(),
        ))?;
    let alg = header.alg;
    let claims = decode_claims(token)?;

    tracing::debug!("Algorithm from JWT header: {:?}", alg);

    let jwks = fetch_jwks(jwks_url).await?;
    let jwk = find_jwk(&jwks, &kid).ok_or(TokenVerificationError::NoMatchingKey)?;

    let decoding_key = convert_jwk_to_decoding_key(jwk, alg)?;

    let signature_valid = verify_signature(token, &decoding_key, alg)?;
    if !signature_valid {
        return Err(TokenVerificationError::InvalidTokenSignature);
    }

    if claims.aud != audience {
        return Err(TokenVerificationError::InvalidTokenAudience(
            audience.to_string(),
            claims.aud.to_string(),
        ));
    }

    if !issuers.contains(&claims.iss.as_str()) {
        return Err(TokenVerificationError::InvalidTokenIssuer(
            claims.iss.to_string(),
        ));
    }

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let skew: u64 = 2; // allow 2 seconds of skew

    if let Some(nbf) = claims.nbf
        && now + skew < nbf as u64
    {
        return Err(TokenVerificationError::TokenNotYetValid(now, nbf as u64));
    }

    if now + skew < claims.iat as u64 {
        // tolerate the system clock to be the skew seconds behind
        return Err(TokenVerificationError::TokenNotYetValid(
            now,
            claims.iat as u64,
        ));
    } else if now > claims.exp as u64 {
        return Err(TokenVerificationError::TokenExpired);
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_json(email_verified: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "iss": "https://accounts.google.com",
            "sub": "12345",
            "aud": "client-id",
            "email": "a@b.c",
            "email_verified": email_verified,
            "iat": 1_700_000_000,
            "exp": 1_700_003_600
        })
    }

    #[test]
    fn test_email_verified_accepts_bool_and_string() {
        let as_bool: IdClaims = serde_json::from_value(claims_json(true.into())).unwrap();
        assert!(as_bool.email_verified());

        let as_string: IdClaims = serde_json::from_value(claims_json("true".into())).unwrap();
        assert!(as_string.email_verified());

        let as_false: IdClaims = serde_json::from_value(claims_json("false".into())).unwrap();
        assert!(!as_false.email_verified());
    }

    #[test]
    fn test_decode_claims_rejects_malformed_token() {
        assert!(matches!(
            decode_claims("only.two"),
            Err(TokenVerificationError::InvalidTokenFormat)
        ));
    }

    #[test]
    fn test_decode_claims_extracts_payload() {
        let payload = URL_SAFE_NO_PAD.encode(claims_json(true.into()).to_string());
        let token = format!("eyJhbGciOiJSUzI1NiJ9.{payload}.c2ln");
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.sub, "12345");
        assert_eq!(claims.email.as_deref(), Some("a@b.c"));
    }

    #[test]
    fn test_find_jwk_by_kid() {
        let jwks = Jwks {
            keys: vec![Jwk {
                kty: "RSA".to_string(),
                kid: "key-1".to_string(),
                alg: Some("RS256".to_string()),
                n: Some("bW9kdWx1cw".to_string()),
                e: Some("AQAB".to_string()),
                x: None,
                y: None,
            }],
        };
        assert!(find_jwk(&jwks, "key-1").is_some());
        assert!(find_jwk(&jwks, "key-2").is_none());
    }
}
