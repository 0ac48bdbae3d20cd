use super::idtoken::verify_idtoken;

use crate::oauth2::config::{APPLE_CLIENT_ID, APPLE_ISSUERS, APPLE_JWKS_URL};
use crate::oauth2::errors::OAuth2Error;
use crate::oauth2::types::{OAuthIdentity, OAuthProvider};

/// Verify an Apple id token and extract the identity.
///
/// Apple only shares the email on first authorization (and may relay a
/// private address); the name never appears in the token.
#[tracing::instrument(skip(id_token))]
pub(crate) async fn verify_apple_token(id_token: &str) -> Result<OAuthIdentity, OAuth2Error> {
    let claims = verify_idtoken(id_token, APPLE_JWKS_URL, APPLE_ISSUERS, &APPLE_CLIENT_ID)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Apple id token rejected"))?;

    let email = if claims.email_verified() {
        claims.email.clone()
    } else {
        None
    };

    Ok(OAuthIdentity {
        provider: OAuthProvider::Apple,
        sub: claims.sub,
        email,
        name: claims.name,
    })
}
