use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Role assigned to a plain account.
pub(crate) const ROLE_USER: &str = "user";
/// Role derived for accounts that own a vendor store.
pub(crate) const ROLE_VENDOR: &str = "vendor";

/// Represents a core user identity in the system
///
/// A user may authenticate with any combination of password, biometric
/// credential, OAuth identity or wallet signature; the identity fields that
/// are not used by a given account stay `None`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct User {
    /// Database-assigned sequence number (primary key)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<i64>,
    /// Unique user identifier
    pub id: String,
    /// Login email, absent for wallet-only accounts
    pub email: Option<String>,
    /// Display name shown on the platform
    pub display_name: String,
    /// Argon2id password hash in PHC format
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,
    /// Lowercased Ethereum address for wallet sign-in
    pub wallet_address: Option<String>,
    /// Google OAuth subject claim
    pub google_sub: Option<String>,
    /// Apple OAuth subject claim
    pub apple_sub: Option<String>,
    /// Derived role, "user" or "vendor"; recomputed from vendor stores
    pub role: String,
    /// Serialized JSON blob of user preferences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<String>,
    /// When the user account was created
    pub created_at: DateTime<Utc>,
    /// When the user account was last updated
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with an email identity
    pub fn new(id: String, email: Option<String>, display_name: String) -> Self {
        let now = Utc::now();
        Self {
            sequence_number: None,
            id,
            email,
            display_name,
            password_hash: None,
            wallet_address: None,
            google_sub: None,
            apple_sub: None,
            role: ROLE_USER.to_string(),
            settings: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A marketplace store owned by a user.
///
/// Presence of a store is what makes an account resolve to the "vendor"
/// role; the store record itself carries only identification metadata.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct VendorStore {
    /// Unique store identifier
    pub id: String,
    /// Owner of the store
    pub user_id: String,
    /// Store display name
    pub name: String,
    /// When the store was created
    pub created_at: DateTime<Utc>,
}

/// Search field options for user lookup.
#[derive(Debug, Clone)]
pub(crate) enum UserSearchField {
    Id(String),
    Email(String),
    WalletAddress(String),
    GoogleSub(String),
    AppleSub(String),
}

impl std::fmt::Display for UserSearchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id={id}"),
            Self::Email(email) => write!(f, "email={email}"),
            Self::WalletAddress(addr) => write!(f, "wallet_address={addr}"),
            Self::GoogleSub(sub) => write!(f, "google_sub={sub}"),
            Self::AppleSub(sub) => write!(f, "apple_sub={sub}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_user_new() {
        let user = User::new(
            "user123".to_string(),
            Some("test@example.com".to_string()),
            "Test User".to_string(),
        );

        assert_eq!(user.id, "user123");
        assert_eq!(user.email.as_deref(), Some("test@example.com"));
        assert_eq!(user.display_name, "Test User");
        assert_eq!(user.role, ROLE_USER);
        assert!(user.password_hash.is_none());
        assert!(user.wallet_address.is_none());
        assert_eq!(user.sequence_number, None);

        let now = Utc::now();
        assert!(now - user.created_at < Duration::seconds(1));
        assert!(now - user.updated_at < Duration::seconds(1));
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let mut user = User::new("user123".to_string(), None, "Test User".to_string());
        user.password_hash = Some("$argon2id$v=19$secret".to_string());

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("password_hash"));
    }

    #[test]
    fn test_search_field_display() {
        let field = UserSearchField::Email("a@b.c".to_string());
        assert_eq!(field.to_string(), "email=a@b.c");
    }
}
