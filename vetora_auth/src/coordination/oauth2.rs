use chrono::Utc;

use crate::oauth2::{OAuthIdentity, OAuthProvider, verify_apple_token, verify_google_token};
use crate::token::{TokenPair, issue_token_pair};
use crate::userdb::{User, UserSearchField, UserStore};

use super::errors::CoordinationError;
use super::role::resolve_role;
use super::user::gen_new_user_id;

/// Sign a user in with a Google or Apple id token.
///
/// The token is verified against the provider's JWKS; the local account is
/// found by provider subject, linked by verified email when the subject is
/// new, or created from scratch.
#[tracing::instrument(skip(id_token))]
pub async fn oauth_sign_in(
    provider: OAuthProvider,
    id_token: &str,
) -> Result<(User, TokenPair), CoordinationError> {
    let identity = match provider {
        OAuthProvider::Google => verify_google_token(id_token).await?,
        OAuthProvider::Apple => verify_apple_token(id_token).await?,
    };

    let mut user = find_or_create_user(&identity).await?;

    user.role = resolve_role(&user.id).await?;
    let tokens = issue_token_pair(&user.id).await?;

    tracing::info!(user_id = %user.id, provider = %identity.provider, "OAuth sign-in");
    Ok((user, tokens))
}

async fn find_or_create_user(identity: &OAuthIdentity) -> Result<User, CoordinationError> {
    let sub_field = match identity.provider {
        OAuthProvider::Google => UserSearchField::GoogleSub(identity.sub.clone()),
        OAuthProvider::Apple => UserSearchField::AppleSub(identity.sub.clone()),
    };

    if let Some(user) = UserStore::get_user_by(sub_field).await? {
        return Ok(user);
    }

    // The subject is new; a verified email links it to an existing account
    if let Some(email) = &identity.email
        && let Some(user) =
            UserStore::get_user_by(UserSearchField::Email(email.to_lowercase())).await?
    {
        tracing::info!(
            user_id = %user.id,
            provider = %identity.provider,
            "Linking provider identity to existing account"
        );
        let linked = set_provider_sub(user, identity);
        return Ok(UserStore::upsert_user(linked).await?);
    }

    let display_name = identity
        .name
        .clone()
        .or_else(|| {
            identity
                .email
                .as_deref()
                .and_then(|e| e.split('@').next())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "Vetora user".to_string());

    let new_user = User::new(
        gen_new_user_id().await?,
        identity.email.as_deref().map(str::to_lowercase),
        display_name,
    );
    let new_user = set_provider_sub(new_user, identity);

    tracing::info!(provider = %identity.provider, "Creating user from provider identity");
    Ok(UserStore::upsert_user(new_user).await?)
}

fn set_provider_sub(mut user: User, identity: &OAuthIdentity) -> User {
    match identity.provider {
        OAuthProvider::Google => user.google_sub = Some(identity.sub.clone()),
        OAuthProvider::Apple => user.apple_sub = Some(identity.sub.clone()),
    }
    user.updated_at = Utc::now();
    user
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_environment;
    use serial_test::serial;

    fn identity(provider: OAuthProvider, sub: &str, email: Option<&str>) -> OAuthIdentity {
        OAuthIdentity {
            provider,
            sub: sub.to_string(),
            email: email.map(str::to_string),
            name: Some("Provider Name".to_string()),
        }
    }

    /// Test that a new provider identity creates a local user
    #[tokio::test]
    #[serial]
    async fn test_creates_user_for_new_subject() {
        init_test_environment().await;

        let sub = format!("google-sub-{}", Utc::now().timestamp_millis());
        let identity = identity(
            OAuthProvider::Google,
            &sub,
            Some("oauth-new@example.com"),
        );

        let user = find_or_create_user(&identity)
            .await
            .expect("User should be created");
        assert_eq!(user.google_sub.as_deref(), Some(sub.as_str()));
        assert_eq!(user.email.as_deref(), Some("oauth-new@example.com"));
        assert_eq!(user.display_name, "Provider Name");

        // A second sign-in with the same subject resolves to the same user
        let again = find_or_create_user(&identity)
            .await
            .expect("Lookup should succeed");
        assert_eq!(again.id, user.id);

        let _ = UserStore::delete_user(&user.id).await;
    }

    /// Test linking a provider subject to an existing email account
    #[tokio::test]
    #[serial]
    async fn test_links_subject_by_email() {
        init_test_environment().await;

        let email = format!("oauth-link-{}@example.com", Utc::now().timestamp_millis());
        let existing = UserStore::upsert_user(User::new(
            format!("oauth-link-{}", Utc::now().timestamp_millis()),
            Some(email.clone()),
            "Existing User".to_string(),
        ))
        .await
        .expect("User creation should succeed");

        let identity = identity(OAuthProvider::Apple, "apple-sub-link", Some(&email));
        let linked = find_or_create_user(&identity)
            .await
            .expect("Linking should succeed");

        assert_eq!(linked.id, existing.id);
        assert_eq!(linked.apple_sub.as_deref(), Some("apple-sub-link"));
        assert_eq!(
            linked.display_name, "Existing User",
            "Linking must not overwrite the profile"
        );

        let _ = UserStore::delete_user(&existing.id).await;
    }

    /// Test that a subject without an email still gets an account
    #[tokio::test]
    #[serial]
    async fn test_creates_user_without_email() {
        init_test_environment().await;

        let sub = format!("apple-sub-{}", Utc::now().timestamp_millis());
        let mut identity = identity(OAuthProvider::Apple, &sub, None);
        identity.name = None;

        let user = find_or_create_user(&identity)
            .await
            .expect("User should be created");
        assert!(user.email.is_none());
        assert_eq!(user.display_name, "Vetora user");
        assert_eq!(user.apple_sub.as_deref(), Some(sub.as_str()));

        let _ = UserStore::delete_user(&user.id).await;
    }
}
