use chrono::Utc;
use ring::{digest, signature::UnparsedPublicKey};

use super::challenge::{consume_auth_challenge, create_auth_challenge};

use crate::biometric::config::{
    AUTH_CHALLENGE_TIMEOUT, ORIGIN, WEBAUTHN_RP_ID, WEBAUTHN_USER_VERIFICATION,
};
use crate::biometric::errors::BiometricError;
use crate::biometric::storage::BiometricStore;
use crate::biometric::types::{
    AllowCredential, AuthenticationOptions, AuthenticatorData, AuthenticatorResponse,
    BiometricCredential, ParsedClientData, RecentDevice,
};
use crate::utils::base64url_decode;

/// Begin biometric authentication for a user.
///
/// When the caller resolved a credential, it is offered as an
/// allow-list entry; otherwise the list stays empty and the
/// authenticator picks a resident credential itself.
pub(crate) async fn start_authentication(
    user_id: &str,
    credential: Option<&BiometricCredential>,
) -> Result<AuthenticationOptions, BiometricError> {
    let mut allow_credentials = Vec::new();
    if let Some(credential) = credential {
        let transports = credential
            .transports
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        allow_credentials.push(AllowCredential {
            type_: "public-key".to_string(),
            id: credential.credential_id.clone(),
            transports,
        });
    }

    let challenge = create_auth_challenge(user_id).await?;

    let options = AuthenticationOptions {
        challenge: challenge.challenge,
        challenge_id: challenge.challenge_id,
        timeout: (*AUTH_CHALLENGE_TIMEOUT) * 1000, // Convert seconds to milliseconds
        rp_id: WEBAUTHN_RP_ID.to_string(),
        allow_credentials,
        user_verification: WEBAUTHN_USER_VERIFICATION.to_string(),
    };

    tracing::debug!("Auth options: {:?}", options);

    Ok(options)
}

/// Finish authentication by verifying the assertion response.
///
/// Returns the credential on success so the caller can identify the
/// user and issue tokens.
#[tracing::instrument(skip(auth_response), fields(credential_id = %auth_response.id))]
pub(crate) async fn finish_authentication(
    auth_response: &AuthenticatorResponse,
) -> Result<BiometricCredential, BiometricError> {
    let stored_credential = BiometricStore::get_credential(&auth_response.id)
        .await?
        .ok_or_else(|| {
            tracing::error!("Credential not found");
            BiometricError::NotFound("Credential not found".into())
        })?;

    let challenge = consume_auth_challenge(
        &stored_credential.user_id,
        auth_response.challenge_id.as_deref(),
    )
    .await?;

    let client_data = ParsedClientData::from_base64(&auth_response.response.client_data_json)?;
    client_data.verify(&challenge, "webauthn.get")?;

    let auth_data = AuthenticatorData::from_base64(&auth_response.response.authenticator_data)?;
    auth_data.verify_rp_id_hash()?;
    if !auth_data.is_user_present() {
        return Err(BiometricError::Authentication(
            "User not present".to_string(),
        ));
    }
    if *WEBAUTHN_USER_VERIFICATION == "required" && !auth_data.is_user_verified() {
        return Err(BiometricError::AuthenticatorData(format!(
            "User verification required but flag not set. Flags: {:02x}",
            auth_data.flags
        )));
    }

    verify_counter(&auth_response.id, &auth_data, &stored_credential).await?;
    verify_signature(auth_response, &client_data, &auth_data, &stored_credential)?;

    let now = Utc::now();
    BiometricStore::update_credential_last_used(&stored_credential.credential_id, now).await?;

    BiometricStore::add_recent_device(&RecentDevice {
        user_id: stored_credential.user_id.clone(),
        device_name: auth_response
            .device_name
            .clone()
            .unwrap_or_else(|| "Unknown device".to_string()),
        authenticated_at: now,
    })
    .await?;

    tracing::info!(user_id = %stored_credential.user_id, "Biometric authentication successful");
    Ok(stored_credential)
}

impl ParsedClientData {
    pub(super) fn from_base64(client_data_json: &str) -> Result<Self, BiometricError> {
        let raw_data = base64url_decode(client_data_json)
            .map_err(|e| BiometricError::Format(format!("Failed to decode: {e}")))?;

        let data_str = String::from_utf8(raw_data.clone())
            .map_err(|e| BiometricError::Format(format!("Invalid UTF-8: {e}")))?;

        let data: serde_json::Value = serde_json::from_str(&data_str)
            .map_err(|e| BiometricError::Format(format!("Invalid JSON: {e}")))?;

        let challenge_str = data["challenge"]
            .as_str()
            .ok_or_else(|| BiometricError::ClientData("Missing challenge".into()))?;

        Ok(Self {
            challenge: challenge_str.to_string(),
            origin: data["origin"]
                .as_str()
                .ok_or_else(|| BiometricError::ClientData("Missing origin".into()))?
                .to_string(),
            type_: data["type"]
                .as_str()
                .ok_or_else(|| BiometricError::ClientData("Missing type".into()))?
                .to_string(),
            raw_data,
        })
    }

    /// Verify challenge, origin and ceremony type.
    pub(super) fn verify(
        &self,
        stored_challenge: &str,
        expected_type: &str,
    ) -> Result<(), BiometricError> {
        if self.challenge != stored_challenge {
            return Err(BiometricError::Challenge("Challenge mismatch".into()));
        }

        if self.origin != *ORIGIN {
            return Err(BiometricError::ClientData(format!(
                "Invalid origin. Expected: {}, Got: {}",
                *ORIGIN, self.origin
            )));
        }

        if self.type_ != expected_type {
            return Err(BiometricError::ClientData(format!(
                "Invalid type. Expected '{expected_type}', Got: {}",
                self.type_
            )));
        }

        Ok(())
    }
}

/// Flags for AuthenticatorData as defined in WebAuthn spec Level 2
mod auth_data_flags {
    /// User Present (UP) - Bit 0
    pub(super) const UP: u8 = 1 << 0;
    /// User Verified (UV) - Bit 2
    pub(super) const UV: u8 = 1 << 2;
    /// Backup Eligibility (BE) - Bit 3 - Indicates if credential is discoverable
    pub(super) const BE: u8 = 1 << 3;
    /// Backup State (BS) - Bit 4
    pub(super) const BS: u8 = 1 << 4;
}

impl AuthenticatorData {
    /// Parse raw authenticator data
    /// Format (minimum 37 bytes):
    /// - RP ID Hash (32 bytes)
    /// - Flags (1 byte)
    /// - Counter (4 bytes)
    /// - Optional: Attested Credential Data
    /// - Optional: Extensions
    pub(super) fn from_bytes(data: Vec<u8>) -> Result<Self, BiometricError> {
        if data.len() < 37 {
            return Err(BiometricError::AuthenticatorData(
                "Authenticator data too short".into(),
            ));
        }

        Ok(Self {
            rp_id_hash: data[..32].to_vec(),
            flags: data[32],
            counter: u32::from_be_bytes([data[33], data[34], data[35], data[36]]),
            raw_data: data,
        })
    }

    pub(super) fn from_base64(auth_data: &str) -> Result<Self, BiometricError> {
        let data = base64url_decode(auth_data)
            .map_err(|e| BiometricError::Format(format!("Failed to decode: {e}")))?;
        Self::from_bytes(data)
    }

    /// Check if user was present during the authentication
    pub(super) fn is_user_present(&self) -> bool {
        (self.flags & auth_data_flags::UP) != 0
    }

    /// Check if user was verified by the authenticator
    pub(super) fn is_user_verified(&self) -> bool {
        (self.flags & auth_data_flags::UV) != 0
    }

    /// Check if this is a discoverable credential (previously known as resident key)
    pub(super) fn is_discoverable(&self) -> bool {
        (self.flags & auth_data_flags::BE) != 0
    }

    /// Check if this credential is backed up
    pub(super) fn is_backed_up(&self) -> bool {
        (self.flags & auth_data_flags::BS) != 0
    }

    /// Verify rpIdHash matches SHA-256 hash of the configured RP ID
    pub(super) fn verify_rp_id_hash(&self) -> Result<(), BiometricError> {
        let expected_hash = digest::digest(&digest::SHA256, WEBAUTHN_RP_ID.as_bytes());
        if self.rp_id_hash != expected_hash.as_ref() {
            return Err(BiometricError::AuthenticatorData(
                "RP ID hash mismatch".to_string(),
            ));
        }
        Ok(())
    }
}

/// Verifies the authenticator counter to prevent replay attacks
///
/// The counter should always increase. A counter value of 0 indicates
/// the authenticator doesn't support counters.
async fn verify_counter(
    credential_id: &str,
    auth_data: &AuthenticatorData,
    stored_credential: &BiometricCredential,
) -> Result<(), BiometricError> {
    let auth_counter = auth_data.counter as i64;
    tracing::debug!(
        "Counter verification - stored: {}, received: {}",
        stored_credential.counter,
        auth_counter
    );

    if auth_counter == 0 {
        // Counter value of 0 means the authenticator doesn't support counters
        tracing::debug!("Authenticator does not support counters (received counter=0)");
    } else if auth_counter <= stored_credential.counter {
        // Counter value decreased or didn't change - possible cloning attack
        tracing::warn!(
            "Counter verification failed - stored: {}, received: {}",
            stored_credential.counter,
            auth_counter
        );
        return Err(BiometricError::Authentication(
            "Counter value decreased - possible credential cloning detected".into(),
        ));
    } else {
        BiometricStore::update_credential_counter(credential_id, auth_counter).await?;
    }

    Ok(())
}

/// Verifies the assertion signature over authenticatorData || SHA-256(clientDataJSON)
fn verify_signature(
    auth_response: &AuthenticatorResponse,
    client_data: &ParsedClientData,
    auth_data: &AuthenticatorData,
    stored_credential: &BiometricCredential,
) -> Result<(), BiometricError> {
    let verification_algorithm = &ring::signature::ECDSA_P256_SHA256_ASN1;

    let public_key = base64url_decode(&stored_credential.public_key)
        .map_err(|e| BiometricError::Format(format!("Invalid public key: {e}")))?;

    let unparsed_public_key = UnparsedPublicKey::new(verification_algorithm, &public_key);

    let signature = base64url_decode(&auth_response.response.signature)
        .map_err(|e| BiometricError::Format(format!("Invalid signature: {e}")))?;

    let client_data_hash = digest::digest(&digest::SHA256, &client_data.raw_data);
    let mut signed_data = Vec::new();
    signed_data.extend_from_slice(&auth_data.raw_data);
    signed_data.extend_from_slice(client_data_hash.as_ref());

    match unparsed_public_key.verify(&signed_data, &signature) {
        Ok(_) => {
            tracing::debug!("Signature verification successful");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Signature verification failed: {:?}", e);
            Err(BiometricError::Verification(
                "Signature verification failed".into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_environment;
    use crate::utils::base64url_encode;
    use serial_test::serial;

    fn encode_client_data(type_: &str, challenge: &str, origin: &str) -> String {
        let json = serde_json::json!({
            "type": type_,
            "challenge": challenge,
            "origin": origin,
        });
        base64url_encode(json.to_string().into_bytes()).unwrap()
    }

    #[test]
    fn test_parsed_client_data_verify() {
        let encoded = encode_client_data("webauthn.get", "chal-value", "http://localhost:3000");
        let parsed = ParsedClientData::from_base64(&encoded).unwrap();

        // FRONTEND_URL in the test environment is http://localhost:3000
        assert!(parsed.verify("chal-value", "webauthn.get").is_ok());

        assert!(matches!(
            parsed.verify("other-value", "webauthn.get"),
            Err(BiometricError::Challenge(_))
        ));
        assert!(matches!(
            parsed.verify("chal-value", "webauthn.create"),
            Err(BiometricError::ClientData(_))
        ));
    }

    #[test]
    fn test_parsed_client_data_rejects_wrong_origin() {
        let encoded = encode_client_data("webauthn.get", "chal-value", "https://evil.example");
        let parsed = ParsedClientData::from_base64(&encoded).unwrap();
        assert!(matches!(
            parsed.verify("chal-value", "webauthn.get"),
            Err(BiometricError::ClientData(_))
        ));
    }

    #[test]
    fn test_parsed_client_data_missing_fields() {
        let json = serde_json::json!({ "type": "webauthn.get" });
        let encoded = base64url_encode(json.to_string().into_bytes()).unwrap();
        assert!(matches!(
            ParsedClientData::from_base64(&encoded),
            Err(BiometricError::ClientData(_))
        ));
    }

    #[test]
    fn test_authenticator_data_flags_and_counter() {
        let mut data = vec![0u8; 37];
        data[32] = 0x1D; // UP | UV | BE | BS
        data[33..37].copy_from_slice(&42u32.to_be_bytes());
        let encoded = base64url_encode(data).unwrap();

        let auth_data = AuthenticatorData::from_base64(&encoded).unwrap();
        assert!(auth_data.is_user_present());
        assert!(auth_data.is_user_verified());
        assert!(auth_data.is_discoverable());
        assert!(auth_data.is_backed_up());
        assert_eq!(auth_data.counter, 42);
    }

    #[test]
    fn test_authenticator_data_too_short() {
        let encoded = base64url_encode(vec![0u8; 36]).unwrap();
        assert!(matches!(
            AuthenticatorData::from_base64(&encoded),
            Err(BiometricError::AuthenticatorData(_))
        ));
    }

    fn auth_data_with_counter(counter: u32) -> AuthenticatorData {
        let mut data = vec![0u8; 37];
        data[32] = 0x05; // UP | UV
        data[33..37].copy_from_slice(&counter.to_be_bytes());
        AuthenticatorData::from_base64(&base64url_encode(data).unwrap()).unwrap()
    }

    fn counter_credential(user_id: &str, credential_id: &str, counter: i64) -> BiometricCredential {
        let now = Utc::now();
        BiometricCredential {
            credential_id: credential_id.to_string(),
            user_id: user_id.to_string(),
            public_key: "ignored".to_string(),
            counter,
            transports: None,
            device_type: "singleDevice".to_string(),
            backed_up: false,
            registered_at: now,
            last_used_at: now,
        }
    }

    /// Test that the signature counter must strictly increase
    ///
    /// A counter equal to or below the stored value means the credential
    /// may have been cloned and the assertion is rejected; a higher value
    /// is accepted and persisted. Counter 0 marks an authenticator without
    /// counter support and passes without an update.
    #[tokio::test]
    #[serial]
    async fn test_counter_must_strictly_increase() {
        init_test_environment().await;

        let credential = counter_credential("counter-user-1", "counter-cred-1", 5);
        BiometricStore::store_credential(&credential)
            .await
            .expect("Credential storage should succeed");

        // Replayed and regressed counters are rejected
        for replayed in [5u32, 3] {
            let result =
                verify_counter(&credential.credential_id, &auth_data_with_counter(replayed), &credential)
                    .await;
            assert!(
                matches!(result, Err(BiometricError::Authentication(_))),
                "counter {replayed} must be rejected against stored counter 5"
            );
        }

        // A strictly higher counter is accepted and stored
        verify_counter(&credential.credential_id, &auth_data_with_counter(6), &credential)
            .await
            .expect("Increased counter should verify");
        let stored = BiometricStore::get_credential(&credential.credential_id)
            .await
            .expect("Lookup should succeed")
            .expect("Credential should exist");
        assert_eq!(stored.counter, 6);

        let _ = BiometricStore::delete_credential_by_user(&credential.user_id).await;
    }

    /// Test that counter 0 is tolerated for counterless authenticators
    #[tokio::test]
    #[serial]
    async fn test_counter_zero_skips_verification() {
        init_test_environment().await;

        let credential = counter_credential("counter-user-2", "counter-cred-2", 5);
        BiometricStore::store_credential(&credential)
            .await
            .expect("Credential storage should succeed");

        verify_counter(&credential.credential_id, &auth_data_with_counter(0), &credential)
            .await
            .expect("Counter 0 should pass");
        let stored = BiometricStore::get_credential(&credential.credential_id)
            .await
            .expect("Lookup should succeed")
            .expect("Credential should exist");
        assert_eq!(stored.counter, 5, "Counter 0 must not overwrite the stored value");

        let _ = BiometricStore::delete_credential_by_user(&credential.user_id).await;
    }
}
