use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claims carried by an access token.
///
/// Access tokens carry the user id and nothing else; they do not expire
/// and stay valid until the signing secret rotates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessClaims {
    pub user_id: String,
}

/// Claims carried by a refresh token.
///
/// The `jti` identifies the server-side record that must exist for the
/// token to be accepted; deleting the record revokes the token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub(super) struct RefreshClaims {
    pub(super) user_id: String,
    pub(super) jti: String,
}

/// Access and refresh token pair returned to a freshly authenticated client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Server-side record for an outstanding refresh token, stored in the
/// cache store under the token's `jti`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct StoredRefreshToken {
    pub(super) user_id: String,
    pub(super) expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_claims_serde() {
        let claims = AccessClaims {
            user_id: "user123".to_string(),
        };
        let json = serde_json::to_string(&claims).unwrap();
        assert_eq!(json, r#"{"user_id":"user123"}"#);

        let parsed: AccessClaims = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, claims);
    }

    #[test]
    fn test_stored_refresh_token_round_trip() {
        let record = StoredRefreshToken {
            user_id: "user123".to_string(),
            expires_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let parsed: StoredRefreshToken = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.user_id, record.user_id);
        assert_eq!(parsed.expires_at, record.expires_at);
    }
}
