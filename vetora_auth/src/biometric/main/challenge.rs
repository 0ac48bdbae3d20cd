use chrono::{Duration, Utc};

use crate::biometric::config::{AUTH_CHALLENGE_TIMEOUT, WEBAUTHN_TIMEOUT};
use crate::biometric::errors::BiometricError;
use crate::biometric::storage::BiometricStore;
use crate::biometric::types::{AuthChallenge, RegistrationChallenge};
use crate::utils::gen_random_string;

/// Issue a registration challenge for a user.
///
/// A user holds at most one registration challenge; reissuing replaces
/// the previous one.
pub(super) async fn create_registration_challenge(
    user_id: &str,
) -> Result<RegistrationChallenge, BiometricError> {
    let challenge = RegistrationChallenge {
        user_id: user_id.to_string(),
        challenge_id: gen_random_string(16)?,
        challenge: gen_random_string(32)?,
        expires_at: Utc::now() + Duration::seconds(*WEBAUTHN_TIMEOUT as i64),
    };

    BiometricStore::put_registration_challenge(&challenge).await?;

    tracing::debug!(challenge_id = %challenge.challenge_id, "Issued registration challenge");
    Ok(challenge)
}

/// Load and validate the registration challenge a client claims to be
/// answering. The challenge stays stored until verification succeeds;
/// the caller removes it afterwards.
pub(super) async fn get_and_validate_registration_challenge(
    user_id: &str,
    challenge_id: &str,
) -> Result<RegistrationChallenge, BiometricError> {
    let stored = BiometricStore::get_registration_challenge(user_id)
        .await?
        .ok_or_else(|| {
            BiometricError::Challenge("No outstanding registration challenge".to_string())
        })?;

    if stored.challenge_id != challenge_id {
        return Err(BiometricError::Challenge(
            "Challenge ID mismatch".to_string(),
        ));
    }

    if stored.expires_at < Utc::now() {
        // Expired challenges are only cleaned up when someone touches them
        BiometricStore::remove_registration_challenge(user_id).await?;
        return Err(BiometricError::ChallengeExpired);
    }

    Ok(stored)
}

/// Issue an authentication challenge, appended to the user's capped ring
/// of outstanding challenges.
pub(super) async fn create_auth_challenge(user_id: &str) -> Result<AuthChallenge, BiometricError> {
    let challenge = AuthChallenge {
        challenge_id: gen_random_string(16)?,
        user_id: user_id.to_string(),
        challenge: gen_random_string(32)?,
        expires_at: Utc::now() + Duration::seconds(*AUTH_CHALLENGE_TIMEOUT as i64),
    };

    BiometricStore::add_auth_challenge(&challenge).await?;

    tracing::debug!(challenge_id = %challenge.challenge_id, "Issued authentication challenge");
    Ok(challenge)
}

/// Resolve and consume the challenge an assertion was signed over.
///
/// Looks in the ring of outstanding authentication challenges first.
/// Clients that predate the ring don't echo a challenge ID, or echo the
/// one from the single legacy slot; both fall back to that slot.
pub(super) async fn consume_auth_challenge(
    user_id: &str,
    challenge_id: Option<&str>,
) -> Result<String, BiometricError> {
    if let Some(challenge_id) = challenge_id {
        if let Some(entry) = BiometricStore::take_auth_challenge(user_id, challenge_id).await? {
            if entry.expires_at < Utc::now() {
                return Err(BiometricError::ChallengeExpired);
            }
            return Ok(entry.challenge);
        }

        // Legacy slot, matched by ID
        if let Some(stored) = BiometricStore::get_registration_challenge(user_id).await?
            && stored.challenge_id == challenge_id
        {
            BiometricStore::remove_registration_challenge(user_id).await?;
            if stored.expires_at < Utc::now() {
                return Err(BiometricError::ChallengeExpired);
            }
            return Ok(stored.challenge);
        }

        return Err(BiometricError::Challenge(
            "Unknown or already used challenge".to_string(),
        ));
    }

    // No challenge ID at all: the legacy single slot is the only candidate
    let stored = BiometricStore::get_registration_challenge(user_id)
        .await?
        .ok_or_else(|| BiometricError::Challenge("No outstanding challenge".to_string()))?;

    BiometricStore::remove_registration_challenge(user_id).await?;
    if stored.expires_at < Utc::now() {
        return Err(BiometricError::ChallengeExpired);
    }

    Ok(stored.challenge)
}
