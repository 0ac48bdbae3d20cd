use chrono::Utc;
use ciborium::value::{Integer, Value as CborValue};

use super::challenge::{create_registration_challenge, get_and_validate_registration_challenge};

use crate::biometric::config::{
    WEBAUTHN_ATTESTATION, WEBAUTHN_RP_ID, WEBAUTHN_RP_NAME, WEBAUTHN_TIMEOUT,
    WEBAUTHN_USER_VERIFICATION,
};
use crate::biometric::errors::BiometricError;
use crate::biometric::storage::BiometricStore;
use crate::biometric::types::{
    AttestationObject, AuthenticatorData, AuthenticatorSelection, BiometricCredential,
    ParsedClientData, PubKeyCredParam, PublicKeyCredentialUserEntity, RegisterCredential,
    RegistrationOptions, RelyingParty,
};
use crate::userdb::User;
use crate::utils::{base64url_decode, base64url_encode};

/// Begin biometric registration for a user.
///
/// Rejects users who already hold a credential; each account gets at
/// most one.
pub(crate) async fn start_registration(user: &User) -> Result<RegistrationOptions, BiometricError> {
    if BiometricStore::get_credential_by_user(&user.id)
        .await?
        .is_some()
    {
        return Err(BiometricError::AlreadyRegistered);
    }

    let challenge = create_registration_challenge(&user.id).await?;

    let user_entity = PublicKeyCredentialUserEntity {
        id: base64url_encode(user.id.clone().into_bytes())?,
        name: user.email.clone().unwrap_or_else(|| user.id.clone()),
        display_name: user.display_name.clone(),
    };

    let options = RegistrationOptions {
        challenge: challenge.challenge,
        challenge_id: challenge.challenge_id,
        rp: RelyingParty {
            name: WEBAUTHN_RP_NAME.to_string(),
            id: WEBAUTHN_RP_ID.to_string(),
        },
        user: user_entity,
        pub_key_cred_params: vec![
            PubKeyCredParam {
                type_: "public-key".to_string(),
                alg: -7,
            },
            PubKeyCredParam {
                type_: "public-key".to_string(),
                alg: -257,
            },
        ],
        authenticator_selection: AuthenticatorSelection {
            authenticator_attachment: "platform".to_string(),
            resident_key: "preferred".to_string(),
            user_verification: WEBAUTHN_USER_VERIFICATION.to_string(),
        },
        timeout: (*WEBAUTHN_TIMEOUT) * 1000, // Convert seconds to milliseconds
        attestation: WEBAUTHN_ATTESTATION.to_string(),
    };

    tracing::debug!("Registration options: {:?}", options);

    Ok(options)
}

/// Finish registration by verifying the attestation response and storing
/// the credential.
///
/// 1. Validates the challenge ID and expiry
/// 2. Verifies the client data against the stored challenge
/// 3. Extracts the public key from the attestation object
/// 4. Stores the credential and clears the challenge
#[tracing::instrument(skip(reg_data), fields(user_id = %user_id))]
pub(crate) async fn finish_registration(
    user_id: &str,
    reg_data: &RegisterCredential,
) -> Result<BiometricCredential, BiometricError> {
    if BiometricStore::get_credential_by_user(user_id)
        .await?
        .is_some()
    {
        return Err(BiometricError::AlreadyRegistered);
    }

    let stored = get_and_validate_registration_challenge(user_id, &reg_data.challenge_id).await?;

    let client_data = ParsedClientData::from_base64(&reg_data.response.client_data_json)?;
    client_data.verify(&stored.challenge, "webauthn.create")?;

    let attestation_obj = parse_attestation_object(&reg_data.response.attestation_object)?;
    tracing::debug!(fmt = %attestation_obj.fmt, "Parsed attestation object");

    let auth_data = AuthenticatorData::from_bytes(attestation_obj.auth_data.clone())?;
    auth_data.verify_rp_id_hash()?;
    if !auth_data.is_user_present() {
        return Err(BiometricError::Registration("User not present".to_string()));
    }

    let public_key = extract_public_key_from_auth_data(&attestation_obj.auth_data)?;

    let transports = reg_data
        .response
        .transports
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let now = Utc::now();
    let credential = BiometricCredential {
        credential_id: reg_data.raw_id.clone(),
        user_id: user_id.to_string(),
        public_key,
        counter: auth_data.counter as i64,
        transports,
        device_type: if auth_data.is_discoverable() {
            "multiDevice".to_string()
        } else {
            "singleDevice".to_string()
        },
        backed_up: auth_data.is_backed_up(),
        registered_at: now,
        last_used_at: now,
    };

    BiometricStore::store_credential(&credential).await?;

    // Remove used challenge
    BiometricStore::remove_registration_challenge(user_id).await?;

    tracing::info!(credential_id = %credential.credential_id, "Biometric registration complete");
    Ok(credential)
}

fn parse_attestation_object(attestation_base64: &str) -> Result<AttestationObject, BiometricError> {
    let attestation_bytes = base64url_decode(attestation_base64)
        .map_err(|e| BiometricError::Format(format!("Failed to decode attestation object: {e}")))?;

    let attestation_cbor: CborValue = ciborium::de::from_reader(&attestation_bytes[..])
        .map_err(|e| BiometricError::Format(format!("Invalid CBOR data: {e}")))?;

    if let CborValue::Map(map) = attestation_cbor {
        let mut fmt = None;
        let mut auth_data = None;

        for (key, value) in map {
            if let CborValue::Text(k) = key {
                match k.as_str() {
                    "fmt" => {
                        if let CborValue::Text(f) = value {
                            fmt = Some(f);
                        }
                    }
                    "authData" => {
                        if let CborValue::Bytes(data) = value {
                            auth_data = Some(data);
                        }
                    }
                    _ => {}
                }
            }
        }

        match (fmt, auth_data) {
            (Some(fmt), Some(auth_data)) => Ok(AttestationObject { fmt, auth_data }),
            _ => Err(BiometricError::Format(
                "Missing required attestation data".to_string(),
            )),
        }
    } else {
        Err(BiometricError::Format(
            "Invalid attestation format".to_string(),
        ))
    }
}

fn extract_public_key_from_auth_data(auth_data: &[u8]) -> Result<String, BiometricError> {
    if auth_data.len() < 37 {
        return Err(BiometricError::AuthenticatorData(
            "Authenticator data too short".to_string(),
        ));
    }

    // Check attested credential data flag
    let flags = auth_data[32];
    let has_attested_cred_data = (flags & 0x40) != 0;
    if !has_attested_cred_data {
        tracing::error!("No attested credential data present");
        return Err(BiometricError::AuthenticatorData(
            "No attested credential data present".to_string(),
        ));
    }

    let credential_data = parse_credential_data(auth_data)?;

    let (x_coord, y_coord) = extract_key_coordinates(credential_data)?;

    // Concatenate x and y coordinates for public key
    let mut public_key = Vec::with_capacity(65);
    public_key.push(0x04); // Uncompressed point format
    public_key.extend_from_slice(&x_coord);
    public_key.extend_from_slice(&y_coord);

    let encoded = base64url_encode(public_key)
        .map_err(|_| BiometricError::Format("Failed to encode public key".to_string()))?;
    Ok(encoded)
}

fn parse_credential_data(auth_data: &[u8]) -> Result<&[u8], BiometricError> {
    let mut pos = 37; // Skip RP ID hash (32) + flags (1) + counter (4)

    if auth_data.len() < pos + 18 {
        tracing::error!("Authenticator data too short");
        return Err(BiometricError::Format(
            "Authenticator data too short".to_string(),
        ));
    }

    pos += 16; // Skip AAGUID

    // Get credential ID length
    let cred_id_len = ((auth_data[pos] as usize) << 8) | (auth_data[pos + 1] as usize);
    pos += 2;

    if cred_id_len == 0 || cred_id_len > 1024 {
        tracing::error!("Invalid credential ID length");
        return Err(BiometricError::Format(
            "Invalid credential ID length".to_string(),
        ));
    }

    if auth_data.len() < pos + cred_id_len {
        tracing::error!("Authenticator data too short for credential ID");
        return Err(BiometricError::Format(
            "Authenticator data too short for credential ID".to_string(),
        ));
    }

    pos += cred_id_len;

    Ok(&auth_data[pos..])
}

fn extract_key_coordinates(credential_data: &[u8]) -> Result<(Vec<u8>, Vec<u8>), BiometricError> {
    let public_key_cbor: CborValue = ciborium::de::from_reader(credential_data).map_err(|e| {
        tracing::error!("Invalid public key CBOR: {}", e);
        BiometricError::Format(format!("Invalid public key CBOR: {e}"))
    })?;

    if let CborValue::Map(map) = public_key_cbor {
        let mut x_coord = None;
        let mut y_coord = None;

        for (key, value) in map {
            if let CborValue::Integer(i) = key {
                if i == Integer::from(-2) {
                    if let CborValue::Bytes(x) = value {
                        x_coord = Some(x);
                    }
                } else if i == Integer::from(-3) {
                    if let CborValue::Bytes(y) = value {
                        y_coord = Some(y);
                    }
                }
            }
        }

        match (x_coord, y_coord) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(BiometricError::Format(
                "Missing or invalid key coordinates".to_string(),
            )),
        }
    } else {
        Err(BiometricError::Format(
            "Invalid public key format".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal COSE EC2 key map and wrap it in attested
    /// credential data
    fn build_auth_data(flags: u8, counter: u32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&[0u8; 32]); // rpIdHash (unchecked here)
        data.push(flags);
        data.extend_from_slice(&counter.to_be_bytes());
        data.extend_from_slice(&[0u8; 16]); // AAGUID

        let cred_id = b"test-credential";
        data.extend_from_slice(&(cred_id.len() as u16).to_be_bytes());
        data.extend_from_slice(cred_id);

        // COSE_Key map with kty, alg, x, y
        let key = CborValue::Map(vec![
            (CborValue::Integer(1.into()), CborValue::Integer(2.into())),
            (
                CborValue::Integer(3.into()),
                CborValue::Integer((-7).into()),
            ),
            (
                CborValue::Integer((-2).into()),
                CborValue::Bytes(vec![0xAA; 32]),
            ),
            (
                CborValue::Integer((-3).into()),
                CborValue::Bytes(vec![0xBB; 32]),
            ),
        ]);
        ciborium::ser::into_writer(&key, &mut data).unwrap();
        data
    }

    #[test]
    fn test_extract_public_key_from_auth_data() {
        let auth_data = build_auth_data(0x45, 0); // UP | UV | AT
        let encoded = extract_public_key_from_auth_data(&auth_data).unwrap();

        let decoded = base64url_decode(&encoded).unwrap();
        assert_eq!(decoded.len(), 65);
        assert_eq!(decoded[0], 0x04);
        assert_eq!(&decoded[1..33], &[0xAA; 32]);
        assert_eq!(&decoded[33..65], &[0xBB; 32]);
    }

    #[test]
    fn test_extract_public_key_requires_attested_data_flag() {
        let auth_data = build_auth_data(0x01, 0); // UP only, no AT
        let result = extract_public_key_from_auth_data(&auth_data);
        assert!(matches!(
            result,
            Err(BiometricError::AuthenticatorData(_))
        ));
    }

    #[test]
    fn test_parse_attestation_object_roundtrip() {
        let auth_data = build_auth_data(0x45, 3);
        let attestation = CborValue::Map(vec![
            (
                CborValue::Text("fmt".to_string()),
                CborValue::Text("none".to_string()),
            ),
            (
                CborValue::Text("authData".to_string()),
                CborValue::Bytes(auth_data.clone()),
            ),
            (
                CborValue::Text("attStmt".to_string()),
                CborValue::Map(vec![]),
            ),
        ]);
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&attestation, &mut bytes).unwrap();
        let encoded = base64url_encode(bytes).unwrap();

        let parsed = parse_attestation_object(&encoded).unwrap();
        assert_eq!(parsed.fmt, "none");
        assert_eq!(parsed.auth_data, auth_data);
    }

    #[test]
    fn test_parse_attestation_object_rejects_garbage() {
        let encoded = base64url_encode(vec![0xFF, 0x00, 0x12]).unwrap();
        assert!(matches!(
            parse_attestation_object(&encoded),
            Err(BiometricError::Format(_))
        ));
    }
}
