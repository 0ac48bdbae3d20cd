use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::biometric::{
    AuthenticationOptions, AuthenticatorResponse, BiometricStore, RegisterCredential,
    RegistrationOptions, finish_authentication, finish_registration, start_authentication,
    start_registration,
};
use crate::token::{TokenPair, issue_token_pair};
use crate::userdb::{User, UserSearchField, UserStore};

use super::errors::CoordinationError;
use super::role::resolve_role;

/// Credential presence and recent activity for one user, as shown on the
/// account security page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricStatus {
    pub registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backed_up: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    pub recent_devices: Vec<RecentDeviceEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentDeviceEntry {
    pub device_name: String,
    pub authenticated_at: DateTime<Utc>,
}

/// Issue WebAuthn creation options for the authenticated user.
#[tracing::instrument]
pub async fn start_biometric_registration(
    user_id: &str,
) -> Result<RegistrationOptions, CoordinationError> {
    let user = get_user(user_id).await?;
    let options = start_registration(&user).await?;
    Ok(options)
}

/// Verify an attestation response and store the credential.
#[tracing::instrument(skip(reg_data))]
pub async fn finish_biometric_registration(
    user_id: &str,
    reg_data: &RegisterCredential,
) -> Result<(), CoordinationError> {
    get_user(user_id).await?;
    let credential = finish_registration(user_id, reg_data).await?;
    tracing::info!(
        user_id = %user_id,
        credential_id = %credential.credential_id,
        "Biometric credential registered"
    );
    Ok(())
}

/// Issue WebAuthn request options for a user identified by email or by
/// credential id.
///
/// Resident-credential flows supply the credential id; email covers the
/// usual second-factor prompt. A request that resolves to no known user is
/// rejected, because challenges are tracked per user.
#[tracing::instrument]
pub async fn start_biometric_authentication(
    email: Option<&str>,
    credential_id: Option<&str>,
) -> Result<AuthenticationOptions, CoordinationError> {
    if let Some(credential_id) = credential_id {
        let credential = BiometricStore::get_credential(credential_id)
            .await?
            .ok_or_else(|| {
                CoordinationError::ResourceNotFound {
                    resource_type: "BiometricCredential".to_string(),
                    resource_id: credential_id.to_string(),
                }
                .log()
            })?;
        let options = start_authentication(&credential.user_id, Some(&credential)).await?;
        return Ok(options);
    }

    if let Some(email) = email {
        let user = UserStore::get_user_by(UserSearchField::Email(email.trim().to_lowercase()))
            .await?
            .ok_or_else(|| {
                CoordinationError::ResourceNotFound {
                    resource_type: "User".to_string(),
                    resource_id: email.to_string(),
                }
                .log()
            })?;
        let credential = BiometricStore::get_credential_by_user(&user.id).await?;
        let options = start_authentication(&user.id, credential.as_ref()).await?;
        return Ok(options);
    }

    Err(CoordinationError::InvalidRequest(
        "Either email or credential id is required".to_string(),
    )
    .log())
}

/// Verify an assertion response and sign the credential's owner in.
#[tracing::instrument(skip(auth_response), fields(credential_id = %auth_response.id))]
pub async fn finish_biometric_authentication(
    auth_response: &AuthenticatorResponse,
) -> Result<(User, TokenPair), CoordinationError> {
    let credential = finish_authentication(auth_response).await?;

    let mut user = get_user(&credential.user_id).await?;
    user.role = resolve_role(&user.id).await?;
    let tokens = issue_token_pair(&user.id).await?;

    Ok((user, tokens))
}

/// Remove the authenticated user's biometric credential.
#[tracing::instrument]
pub async fn remove_biometric_credential(user_id: &str) -> Result<(), CoordinationError> {
    let credential = BiometricStore::get_credential_by_user(user_id)
        .await?
        .ok_or_else(|| {
            CoordinationError::ResourceNotFound {
                resource_type: "BiometricCredential".to_string(),
                resource_id: user_id.to_string(),
            }
            .log()
        })?;

    BiometricStore::delete_credential_by_user(user_id).await?;
    tracing::info!(
        user_id = %user_id,
        credential_id = %credential.credential_id,
        "Biometric credential removed"
    );
    Ok(())
}

/// Report credential presence and recent sign-in devices for a user.
pub async fn biometric_status(user_id: &str) -> Result<BiometricStatus, CoordinationError> {
    get_user(user_id).await?;

    let credential = BiometricStore::get_credential_by_user(user_id).await?;
    let recent_devices = BiometricStore::get_recent_devices(user_id)
        .await?
        .into_iter()
        .map(|d| RecentDeviceEntry {
            device_name: d.device_name,
            authenticated_at: d.authenticated_at,
        })
        .collect();

    Ok(match credential {
        Some(credential) => BiometricStatus {
            registered: true,
            device_type: Some(credential.device_type),
            backed_up: Some(credential.backed_up),
            registered_at: Some(credential.registered_at),
            last_used_at: Some(credential.last_used_at),
            recent_devices,
        },
        None => BiometricStatus {
            registered: false,
            device_type: None,
            backed_up: None,
            registered_at: None,
            last_used_at: None,
            recent_devices,
        },
    })
}

async fn get_user(user_id: &str) -> Result<User, CoordinationError> {
    UserStore::get_user(user_id).await?.ok_or_else(|| {
        CoordinationError::ResourceNotFound {
            resource_type: "User".to_string(),
            resource_id: user_id.to_string(),
        }
        .log()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biometric::BiometricError;
    use crate::test_utils::init_test_environment;
    use serial_test::serial;

    async fn create_user(tag: &str) -> User {
        let id = format!("bio-coord-{tag}-{}", Utc::now().timestamp_millis());
        UserStore::upsert_user(User::new(
            id.clone(),
            Some(format!("{id}@example.com")),
            "Bio User".to_string(),
        ))
        .await
        .expect("User creation should succeed")
    }

    /// Test that registration options are issued for a fresh user
    #[tokio::test]
    #[serial]
    async fn test_start_registration_for_fresh_user() {
        init_test_environment().await;

        let user = create_user("fresh").await;
        let options = start_biometric_registration(&user.id)
            .await
            .expect("Options should be issued");
        assert!(!options.challenge.is_empty());
        assert!(!options.challenge_id.is_empty());

        let _ = UserStore::delete_user(&user.id).await;
    }

    /// Test that an unknown user cannot start registration
    #[tokio::test]
    #[serial]
    async fn test_start_registration_unknown_user() {
        init_test_environment().await;

        let result = start_biometric_registration("no-such-user").await;
        assert!(matches!(
            result,
            Err(CoordinationError::ResourceNotFound { .. })
        ));
    }

    /// Test that authentication options require an email or credential id
    #[tokio::test]
    #[serial]
    async fn test_start_authentication_requires_identifier() {
        init_test_environment().await;

        let result = start_biometric_authentication(None, None).await;
        assert!(matches!(result, Err(CoordinationError::InvalidRequest(_))));

        let result = start_biometric_authentication(Some("ghost@example.com"), None).await;
        assert!(matches!(
            result,
            Err(CoordinationError::ResourceNotFound { .. })
        ));

        let result = start_biometric_authentication(None, Some("no-such-credential")).await;
        assert!(matches!(
            result,
            Err(CoordinationError::ResourceNotFound { .. })
        ));
    }

    /// Test that authentication options resolve a user by email
    #[tokio::test]
    #[serial]
    async fn test_start_authentication_by_email() {
        init_test_environment().await;

        let user = create_user("byemail").await;
        let email = user.email.clone().expect("email set");

        // No credential registered yet, so the allow list is empty
        let options = start_biometric_authentication(Some(&email), None)
            .await
            .expect("Options should be issued");
        assert!(options.allow_credentials.is_empty());
        assert!(!options.challenge.is_empty());

        let _ = UserStore::delete_user(&user.id).await;
    }

    /// Test the status report for a user without a credential
    #[tokio::test]
    #[serial]
    async fn test_status_without_credential() {
        init_test_environment().await;

        let user = create_user("status").await;
        let status = biometric_status(&user.id)
            .await
            .expect("Status should succeed");
        assert!(!status.registered);
        assert!(status.device_type.is_none());
        assert!(status.recent_devices.is_empty());

        // Removing a credential that does not exist is reported as not found
        assert!(matches!(
            remove_biometric_credential(&user.id).await,
            Err(CoordinationError::ResourceNotFound { .. })
        ));

        let _ = UserStore::delete_user(&user.id).await;
    }

    /// Test that a bad assertion surfaces as a biometric error
    #[tokio::test]
    #[serial]
    async fn test_finish_authentication_unknown_credential() {
        init_test_environment().await;

        let response: AuthenticatorResponse = serde_json::from_value(serde_json::json!({
            "id": "unknown-credential",
            "challengeId": "whatever",
            "response": {
                "clientDataJSON": "e30",
                "authenticatorData": "AAAA",
                "signature": "AAAA",
                "userHandle": null
            }
        }))
        .expect("Response should deserialize");

        let result = finish_biometric_authentication(&response).await;
        assert!(matches!(
            result,
            Err(CoordinationError::BiometricError(BiometricError::NotFound(
                _
            )))
        ));
    }
}
