use axum::{Router, extract::Json as ExtractJson, response::Json, routing::post};
use http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use vetora_auth::{request_wallet_nonce, wallet_sign_in};

use crate::error::IntoResponseError;

/// Create a router for the wallet sign-in endpoint
pub(crate) fn router() -> Router<()> {
    Router::new().route("/wallet", post(wallet))
}

/// One endpoint, two phases: without a signature the server issues the
/// message to sign; with one it completes the sign-in.
#[derive(Deserialize)]
struct WalletRequest {
    address: String,
    message: Option<String>,
    signature: Option<String>,
}

async fn wallet(
    ExtractJson(payload): ExtractJson<WalletRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match (payload.message, payload.signature) {
        (Some(message), Some(signature)) => {
            let (user, tokens) = wallet_sign_in(&payload.address, &message, &signature)
                .await
                .into_response_error()?;

            Ok(Json(json!({
                "success": true,
                "user": user,
                "accessToken": tokens.access_token,
                "refreshToken": tokens.refresh_token,
            })))
        }
        (None, None) => {
            let message = request_wallet_nonce(&payload.address)
                .await
                .into_response_error()?;

            Ok(Json(json!({
                "success": true,
                "message": message,
            })))
        }
        _ => Err((
            StatusCode::BAD_REQUEST,
            crate::error::error_body("Message and signature must be supplied together"),
        )),
    }
}
