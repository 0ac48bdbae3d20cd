use axum::{
    Router,
    extract::Json as ExtractJson,
    response::Json,
    routing::{delete, get, post},
};
use http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use vetora_auth::{
    AuthenticationOptions, AuthenticatorResponse, RegisterCredential, RegistrationOptions,
    biometric_status, finish_biometric_authentication, finish_biometric_registration,
    remove_biometric_credential, start_biometric_authentication, start_biometric_registration,
};

use crate::auth::AuthUser;
use crate::error::IntoResponseError;

/// Create a router for the biometric (WebAuthn) endpoints
pub(crate) fn router() -> Router<()> {
    Router::new()
        .route(
            "/generate-registration-options",
            post(generate_registration_options),
        )
        .route("/register", post(register))
        .route(
            "/generate-authentication-options",
            post(generate_authentication_options),
        )
        .route("/authenticate", post(authenticate))
        .route("/remove", delete(remove))
        .route("/status", get(status))
}

async fn generate_registration_options(
    auth_user: AuthUser,
) -> Result<Json<RegistrationOptions>, (StatusCode, Json<Value>)> {
    let options = start_biometric_registration(&auth_user.id)
        .await
        .into_response_error()?;

    Ok(Json(options))
}

async fn register(
    auth_user: AuthUser,
    ExtractJson(reg_data): ExtractJson<RegisterCredential>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    finish_biometric_registration(&auth_user.id, &reg_data)
        .await
        .into_response_error()?;

    Ok(Json(json!({
        "success": true,
        "message": "Biometric credential registered",
    })))
}

/// Identifies the account to authenticate; both fields optional to support
/// resident-credential flows.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticationOptionsRequest {
    email: Option<String>,
    credential_id: Option<String>,
}

async fn generate_authentication_options(
    ExtractJson(payload): ExtractJson<AuthenticationOptionsRequest>,
) -> Result<Json<AuthenticationOptions>, (StatusCode, Json<Value>)> {
    let options = start_biometric_authentication(
        payload.email.as_deref(),
        payload.credential_id.as_deref(),
    )
    .await
    .into_response_error()?;

    Ok(Json(options))
}

async fn authenticate(
    ExtractJson(auth_response): ExtractJson<AuthenticatorResponse>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let (user, tokens) = finish_biometric_authentication(&auth_response)
        .await
        .into_response_error()?;

    Ok(Json(json!({
        "success": true,
        "user": user,
        "accessToken": tokens.access_token,
        "refreshToken": tokens.refresh_token,
    })))
}

async fn remove(auth_user: AuthUser) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    remove_biometric_credential(&auth_user.id)
        .await
        .into_response_error()?;

    Ok(Json(json!({
        "success": true,
        "message": "Biometric credential removed",
    })))
}

async fn status(auth_user: AuthUser) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let status = biometric_status(&auth_user.id)
        .await
        .into_response_error()?;

    Ok(Json(json!({ "success": true, "status": status })))
}
