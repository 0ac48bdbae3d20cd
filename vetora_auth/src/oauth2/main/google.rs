use super::idtoken::verify_idtoken;

use crate::oauth2::config::{GOOGLE_CLIENT_ID, GOOGLE_ISSUERS, GOOGLE_JWKS_URL};
use crate::oauth2::errors::OAuth2Error;
use crate::oauth2::types::{OAuthIdentity, OAuthProvider};

/// Verify a Google id token and extract the identity.
///
/// Google always supplies an email; we still treat it as unusable when
/// the provider marks it unverified.
#[tracing::instrument(skip(id_token))]
pub(crate) async fn verify_google_token(id_token: &str) -> Result<OAuthIdentity, OAuth2Error> {
    let claims = verify_idtoken(id_token, GOOGLE_JWKS_URL, GOOGLE_ISSUERS, &GOOGLE_CLIENT_ID)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Google id token rejected"))?;

    let email = if claims.email_verified() {
        claims.email.clone()
    } else {
        tracing::debug!(sub = %claims.sub, "Google email present but not verified");
        None
    };

    Ok(OAuthIdentity {
        provider: OAuthProvider::Google,
        sub: claims.sub,
        email,
        name: claims.name,
    })
}
