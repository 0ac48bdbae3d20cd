use axum::{Router, extract::Json as ExtractJson, response::Json, routing::post};
use http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use vetora_auth::{OAuthProvider, oauth_sign_in};

use crate::error::IntoResponseError;

/// Create a router for the OAuth id-token endpoints
pub(crate) fn router() -> Router<()> {
    Router::new()
        .route("/google", post(google))
        .route("/apple", post(apple))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OAuthRequest {
    id_token: String,
}

async fn google(
    ExtractJson(payload): ExtractJson<OAuthRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    sign_in(OAuthProvider::Google, &payload.id_token).await
}

async fn apple(
    ExtractJson(payload): ExtractJson<OAuthRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    sign_in(OAuthProvider::Apple, &payload.id_token).await
}

async fn sign_in(
    provider: OAuthProvider,
    id_token: &str,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let (user, tokens) = oauth_sign_in(provider, id_token)
        .await
        .into_response_error()?;

    Ok(Json(json!({
        "success": true,
        "user": user,
        "accessToken": tokens.access_token,
        "refreshToken": tokens.refresh_token,
    })))
}
