use axum::{
    Router,
    extract::Json as ExtractJson,
    response::Json,
    routing::{delete, get, post, put},
};
use http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use vetora_auth::{
    ProfileUpdate, TokenPair, User, change_password, delete_account, get_profile, login_user,
    logout, refresh_tokens, register_user, update_profile, update_settings,
};

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::IntoResponseError;

/// Create a router for account and token endpoints
pub(crate) fn router() -> Router<()> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout_handler))
        .route("/profile", get(get_profile_handler).put(update_profile_handler))
        .route("/settings", put(update_settings_handler))
        .route("/password", put(change_password_handler))
        .route("/account", delete(delete_account_handler))
        .route("/me", get(me))
}

fn signed_in_body(user: &User, tokens: &TokenPair) -> Json<Value> {
    Json(json!({
        "success": true,
        "user": user,
        "accessToken": tokens.access_token,
        "refreshToken": tokens.refresh_token,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    email: String,
    password: String,
    #[serde(default)]
    display_name: String,
}

async fn register(
    ExtractJson(payload): ExtractJson<RegisterRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let (user, tokens) = register_user(&payload.email, &payload.password, &payload.display_name)
        .await
        .into_response_error()?;

    Ok(signed_in_body(&user, &tokens))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    ExtractJson(payload): ExtractJson<LoginRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let (user, tokens) = login_user(&payload.email, &payload.password)
        .await
        .into_response_error()?;

    Ok(signed_in_body(&user, &tokens))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

async fn refresh(
    ExtractJson(payload): ExtractJson<RefreshRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let tokens = refresh_tokens(&payload.refresh_token)
        .await
        .into_response_error()?;

    Ok(Json(json!({
        "success": true,
        "accessToken": tokens.access_token,
        "refreshToken": tokens.refresh_token,
    })))
}

async fn logout_handler(
    ExtractJson(payload): ExtractJson<RefreshRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    logout(&payload.refresh_token).await.into_response_error()?;

    Ok(Json(json!({
        "success": true,
        "message": "Logged out",
    })))
}

async fn get_profile_handler(
    auth_user: AuthUser,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let user = get_profile(&auth_user.id).await.into_response_error()?;

    Ok(Json(json!({ "success": true, "user": user })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    display_name: Option<String>,
    email: Option<String>,
}

async fn update_profile_handler(
    auth_user: AuthUser,
    ExtractJson(payload): ExtractJson<UpdateProfileRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let user = update_profile(
        &auth_user.id,
        ProfileUpdate {
            display_name: payload.display_name,
            email: payload.email,
        },
    )
    .await
    .into_response_error()?;

    Ok(Json(json!({ "success": true, "user": user })))
}

#[derive(Deserialize)]
struct UpdateSettingsRequest {
    settings: Value,
}

async fn update_settings_handler(
    auth_user: AuthUser,
    ExtractJson(payload): ExtractJson<UpdateSettingsRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let user = update_settings(&auth_user.id, payload.settings)
        .await
        .into_response_error()?;

    Ok(Json(json!({ "success": true, "user": user })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

async fn change_password_handler(
    auth_user: AuthUser,
    ExtractJson(payload): ExtractJson<ChangePasswordRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    change_password(
        &auth_user.id,
        &payload.current_password,
        &payload.new_password,
    )
    .await
    .into_response_error()?;

    Ok(Json(json!({
        "success": true,
        "message": "Password changed",
    })))
}

async fn delete_account_handler(
    auth_user: AuthUser,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    delete_account(&auth_user.id).await.into_response_error()?;

    Ok(Json(json!({
        "success": true,
        "message": "Account deleted",
    })))
}

/// Current-identity endpoint, usable by anonymous callers.
///
/// Signed-in callers get their profile; everyone else gets `user: null`
/// rather than a 401.
async fn me(MaybeAuthUser(user): MaybeAuthUser) -> Json<Value> {
    Json(json!({ "success": true, "user": user }))
}
