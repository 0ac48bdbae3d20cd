use argon2::Argon2;
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};
use chrono::Utc;

use crate::biometric::BiometricStore;
use crate::token::{TokenPair, issue_token_pair};
use crate::userdb::{User, UserSearchField, UserStore, VendorStoreStore};
use crate::utils::gen_random_string;

use super::errors::CoordinationError;
use super::role::{invalidate_role_cache, resolve_role};

/// Fields a user may change on their own profile.
#[derive(Debug, Default, Clone)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// Register a new user with an email and password.
///
/// Returns the stored user together with a fresh token pair so the client
/// is signed in immediately.
#[tracing::instrument(skip(password))]
pub async fn register_user(
    email: &str,
    password: &str,
    display_name: &str,
) -> Result<(User, TokenPair), CoordinationError> {
    let email = normalize_email(email)?;
    if password.len() < 8 {
        return Err(
            CoordinationError::InvalidRequest("Password must be at least 8 characters".to_string())
                .log(),
        );
    }

    if UserStore::get_user_by(UserSearchField::Email(email.clone()))
        .await?
        .is_some()
    {
        return Err(CoordinationError::Conflict("Email already registered".to_string()).log());
    }

    let display_name = if display_name.trim().is_empty() {
        email
            .split('@')
            .next()
            .unwrap_or("Vetora user")
            .to_string()
    } else {
        display_name.trim().to_string()
    };

    let mut user = User::new(gen_new_user_id().await?, Some(email), display_name);
    user.password_hash = Some(hash_password(password)?);

    let user = UserStore::upsert_user(user).await?;
    let tokens = issue_token_pair(&user.id).await?;

    tracing::info!(user_id = %user.id, "Registered new user");
    Ok((user, tokens))
}

/// Sign a user in with email and password.
///
/// Lookup failure and wrong password both collapse to `Unauthorized` so the
/// response does not reveal which one occurred.
#[tracing::instrument(skip(password))]
pub async fn login_user(
    email: &str,
    password: &str,
) -> Result<(User, TokenPair), CoordinationError> {
    let email = normalize_email(email)?;

    let mut user = UserStore::get_user_by(UserSearchField::Email(email))
        .await?
        .ok_or_else(|| CoordinationError::Unauthorized.log())?;

    let hash = user
        .password_hash
        .as_deref()
        .ok_or_else(|| CoordinationError::Unauthorized.log())?;
    if !verify_password(password, hash) {
        return Err(CoordinationError::Unauthorized.log());
    }

    user.role = resolve_role(&user.id).await?;
    let tokens = issue_token_pair(&user.id).await?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok((user, tokens))
}

/// Fetch a user's profile with the derived role attached.
pub async fn get_profile(user_id: &str) -> Result<User, CoordinationError> {
    let mut user = UserStore::get_user(user_id).await?.ok_or_else(|| {
        CoordinationError::ResourceNotFound {
            resource_type: "User".to_string(),
            resource_id: user_id.to_string(),
        }
        .log()
    })?;

    user.role = resolve_role(&user.id).await?;
    Ok(user)
}

/// Update a user's display name and/or email.
pub async fn update_profile(
    user_id: &str,
    update: ProfileUpdate,
) -> Result<User, CoordinationError> {
    let user = UserStore::get_user(user_id).await?.ok_or_else(|| {
        CoordinationError::ResourceNotFound {
            resource_type: "User".to_string(),
            resource_id: user_id.to_string(),
        }
        .log()
    })?;

    let email = match update.email {
        Some(email) => {
            let email = normalize_email(&email)?;
            // Another account may already own the new address
            if let Some(existing) = UserStore::get_user_by(UserSearchField::Email(email.clone()))
                .await?
                && existing.id != user.id
            {
                return Err(
                    CoordinationError::Conflict("Email already registered".to_string()).log(),
                );
            }
            Some(email)
        }
        None => user.email.clone(),
    };

    let updated_user = User {
        display_name: update.display_name.unwrap_or(user.display_name.clone()),
        email,
        updated_at: Utc::now(),
        ..user
    };

    let user = UserStore::upsert_user(updated_user).await?;
    Ok(user)
}

/// Replace a user's settings blob.
pub async fn update_settings(
    user_id: &str,
    settings: serde_json::Value,
) -> Result<User, CoordinationError> {
    let user = UserStore::get_user(user_id).await?.ok_or_else(|| {
        CoordinationError::ResourceNotFound {
            resource_type: "User".to_string(),
            resource_id: user_id.to_string(),
        }
        .log()
    })?;

    let settings = serde_json::to_string(&settings)
        .map_err(|e| CoordinationError::InvalidRequest(e.to_string()))?;

    let updated_user = User {
        settings: Some(settings),
        updated_at: Utc::now(),
        ..user
    };

    let user = UserStore::upsert_user(updated_user).await?;
    Ok(user)
}

/// Change a user's password after verifying the current one.
#[tracing::instrument(skip(current_password, new_password))]
pub async fn change_password(
    user_id: &str,
    current_password: &str,
    new_password: &str,
) -> Result<(), CoordinationError> {
    if new_password.len() < 8 {
        return Err(
            CoordinationError::InvalidRequest("Password must be at least 8 characters".to_string())
                .log(),
        );
    }

    let user = UserStore::get_user(user_id).await?.ok_or_else(|| {
        CoordinationError::ResourceNotFound {
            resource_type: "User".to_string(),
            resource_id: user_id.to_string(),
        }
        .log()
    })?;

    let hash = user
        .password_hash
        .as_deref()
        .ok_or_else(|| CoordinationError::Unauthorized.log())?;
    if !verify_password(current_password, hash) {
        return Err(CoordinationError::Unauthorized.log());
    }

    let updated_user = User {
        password_hash: Some(hash_password(new_password)?),
        updated_at: Utc::now(),
        ..user
    };
    UserStore::upsert_user(updated_user).await?;

    tracing::info!(user_id = %user_id, "Password changed");
    Ok(())
}

/// Delete a user account and everything hanging off it.
///
/// Removes the biometric credential, outstanding challenges, vendor stores
/// and the cached role before the user row itself.
#[tracing::instrument]
pub async fn delete_account(user_id: &str) -> Result<(), CoordinationError> {
    let user = UserStore::get_user(user_id).await?.ok_or_else(|| {
        CoordinationError::ResourceNotFound {
            resource_type: "User".to_string(),
            resource_id: user_id.to_string(),
        }
        .log()
    })?;

    BiometricStore::delete_credential_by_user(&user.id).await?;
    VendorStoreStore::delete_stores_for_user(&user.id).await?;
    invalidate_role_cache(&user.id).await?;
    UserStore::delete_user(&user.id).await?;

    tracing::info!(user_id = %user.id, "Deleted user account");
    Ok(())
}

/// Generate a unique user ID, with built-in collision detection.
pub(super) async fn gen_new_user_id() -> Result<String, CoordinationError> {
    // Try up to 3 times to generate a unique ID
    for _ in 0..3 {
        let id = gen_random_string(32)?;

        match UserStore::get_user(&id).await {
            Ok(None) => return Ok(id),
            Ok(Some(_)) => continue,
            Err(e) => {
                return Err(
                    CoordinationError::Database(format!("Failed to check user ID: {e}")).log(),
                );
            }
        }
    }

    // Vanishingly unlikely with 32 random characters, but handled anyway
    Err(CoordinationError::Coordination(
        "Failed to generate a unique user ID after multiple attempts".to_string(),
    )
    .log())
}

fn normalize_email(email: &str) -> Result<String, CoordinationError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(CoordinationError::InvalidRequest("Invalid email address".to_string()).log());
    }
    Ok(email)
}

pub(super) fn hash_password(password: &str) -> Result<String, CoordinationError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CoordinationError::Coordination(format!("Failed to hash password: {e}")))
}

pub(super) fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
