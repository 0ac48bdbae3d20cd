use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Stored biometric (WebAuthn) credential for a user.
///
/// At most one credential exists per user; the `counter` is the
/// authenticator's signature counter used to detect cloned credentials.
#[derive(Clone, Serialize, Deserialize, Debug, FromRow, PartialEq)]
pub struct BiometricCredential {
    /// Base64url credential ID as reported by the authenticator
    pub credential_id: String,
    /// User this credential belongs to
    pub user_id: String,
    /// Base64url uncompressed P-256 public key (0x04 || x || y)
    pub public_key: String,
    /// Signature counter; 0 means the authenticator does not support counters
    pub counter: i64,
    /// JSON array of transports reported at registration, e.g. ["internal"]
    pub transports: Option<String>,
    /// "singleDevice" or "multiDevice", derived from the BE flag
    pub device_type: String,
    /// Whether the credential is synced to a backup (BS flag)
    pub backed_up: bool,
    /// When the credential was registered
    pub registered_at: DateTime<Utc>,
    /// When the credential was last used for authentication
    pub last_used_at: DateTime<Utc>,
}

/// Single outstanding registration challenge for a user.
///
/// Doubles as the legacy challenge slot older clients authenticate
/// against when they do not echo a challenge ID from the options call.
#[derive(Clone, Serialize, Deserialize, Debug, FromRow)]
pub(crate) struct RegistrationChallenge {
    pub(crate) user_id: String,
    pub(crate) challenge_id: String,
    pub(crate) challenge: String,
    pub(crate) expires_at: DateTime<Utc>,
}

/// One entry in a user's ring of outstanding authentication challenges.
#[derive(Clone, Serialize, Deserialize, Debug, FromRow)]
pub(crate) struct AuthChallenge {
    pub(crate) challenge_id: String,
    pub(crate) user_id: String,
    pub(crate) challenge: String,
    pub(crate) expires_at: DateTime<Utc>,
}

/// Record of a device that recently completed biometric authentication.
#[derive(Clone, Serialize, Deserialize, Debug, FromRow)]
pub(crate) struct RecentDevice {
    pub(crate) user_id: String,
    pub(crate) device_name: String,
    pub(crate) authenticated_at: DateTime<Utc>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct PublicKeyCredentialUserEntity {
    pub id: String,
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

#[derive(Serialize, Debug)]
pub struct RelyingParty {
    pub name: String,
    pub id: String,
}

#[derive(Serialize, Debug)]
pub struct PubKeyCredParam {
    #[serde(rename = "type")]
    pub type_: String,
    pub alg: i32,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    pub authenticator_attachment: String,
    pub resident_key: String,
    pub user_verification: String,
}

/// Options returned by the generate-registration-options endpoint,
/// shaped as a WebAuthn PublicKeyCredentialCreationOptions.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub challenge: String,
    pub challenge_id: String,
    pub rp: RelyingParty,
    pub user: PublicKeyCredentialUserEntity,
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    pub authenticator_selection: AuthenticatorSelection,
    pub timeout: u32,
    pub attestation: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AttestationResponse {
    // The browser spells this one with JSON fully capitalized
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub attestation_object: String,
    pub transports: Option<Vec<String>>,
}

/// Credential creation response posted by the browser to finish
/// registration.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCredential {
    pub id: String,
    pub raw_id: String,
    pub challenge_id: String,
    pub response: AttestationResponse,
    #[serde(rename = "type")]
    pub type_: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AllowCredential {
    #[serde(rename = "type")]
    pub type_: String,
    pub id: String,
    pub transports: Option<Vec<String>>,
}

/// Options returned by the generate-authentication-options endpoint.
///
/// `allow_credentials` is empty for resident-credential (passwordless)
/// flows where the authenticator picks the credential itself.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    pub challenge: String,
    pub challenge_id: String,
    pub timeout: u32,
    pub rp_id: String,
    pub allow_credentials: Vec<AllowCredential>,
    pub user_verification: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub authenticator_data: String,
    pub signature: String,
    pub user_handle: Option<String>,
}

/// Assertion posted by the browser to finish authentication.
///
/// `challenge_id` is optional: older clients only carry the single
/// legacy challenge and do not echo an ID.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorResponse {
    pub id: String,
    pub challenge_id: Option<String>,
    pub response: AssertionResponse,
    pub device_name: Option<String>,
}

/// Decoded attestation object from the registration response.
pub(super) struct AttestationObject {
    pub(super) fmt: String,
    pub(super) auth_data: Vec<u8>,
}

/// Fields of interest parsed out of clientDataJSON.
#[derive(Debug)]
pub(super) struct ParsedClientData {
    pub(super) challenge: String,
    pub(super) origin: String,
    pub(super) type_: String,
    pub(super) raw_data: Vec<u8>,
}

/// Parsed authenticator data structure.
#[derive(Debug)]
pub(super) struct AuthenticatorData {
    pub(super) rp_id_hash: Vec<u8>,
    pub(super) flags: u8,
    pub(super) counter: u32,
    pub(super) raw_data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_credential_deserializes_camel_case() {
        let json = r#"{
            "id": "cred-1",
            "rawId": "cred-1",
            "challengeId": "chal-1",
            "type": "public-key",
            "response": {
                "clientDataJSON": "e30",
                "attestationObject": "e30",
                "transports": ["internal"]
            }
        }"#;

        let parsed: RegisterCredential = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.raw_id, "cred-1");
        assert_eq!(parsed.challenge_id, "chal-1");
        assert_eq!(
            parsed.response.transports,
            Some(vec!["internal".to_string()])
        );
    }

    #[test]
    fn test_authenticator_response_challenge_id_is_optional() {
        let json = r#"{
            "id": "cred-1",
            "response": {
                "clientDataJSON": "e30",
                "authenticatorData": "e30",
                "signature": "e30"
            }
        }"#;

        let parsed: AuthenticatorResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.challenge_id.is_none());
        assert!(parsed.response.user_handle.is_none());
        assert!(parsed.device_name.is_none());
    }

    #[test]
    fn test_registration_options_serialize_camel_case() {
        let options = RegistrationOptions {
            challenge: "c".to_string(),
            challenge_id: "cid".to_string(),
            rp: RelyingParty {
                name: "Vetora".to_string(),
                id: "localhost".to_string(),
            },
            user: PublicKeyCredentialUserEntity::default(),
            pub_key_cred_params: vec![PubKeyCredParam {
                type_: "public-key".to_string(),
                alg: -7,
            }],
            authenticator_selection: AuthenticatorSelection {
                authenticator_attachment: "platform".to_string(),
                resident_key: "preferred".to_string(),
                user_verification: "preferred".to_string(),
            },
            timeout: 300_000,
            attestation: "none".to_string(),
        };

        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["challengeId"], "cid");
        assert_eq!(json["pubKeyCredParams"][0]["type"], "public-key");
        assert_eq!(
            json["authenticatorSelection"]["userVerification"],
            "preferred"
        );
    }
}
