//! Bearer-token extractors for authenticated endpoints
//!
//! `AuthUser` is the strict extractor: a missing or unverifiable token
//! rejects the request with 401 before the handler runs. `MaybeAuthUser`
//! never rejects; handlers that serve both signed-in and anonymous callers
//! use it and get `None` for the latter.

use axum::{
    RequestPartsExt,
    extract::{FromRequestParts, OptionalFromRequestParts},
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use http::{StatusCode, request::Parts};
use std::convert::Infallible;
use std::ops::Deref;

use vetora_auth::{User, authenticate_access_token};

use super::error::error_body;

/// The authenticated user behind a verified bearer token, with the derived
/// role attached.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl Deref for AuthUser {
    type Target = User;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Rejection returned when strict authentication fails.
pub struct AuthRejection;

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            error_body("Authentication required"),
        )
            .into_response()
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| {
                tracing::debug!("Missing or malformed Authorization header");
                AuthRejection
            })?;

        let user = authenticate_access_token(bearer.token())
            .await
            .map_err(|_| AuthRejection)?;

        Ok(AuthUser(user))
    }
}

impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let result = <AuthUser as FromRequestParts<S>>::from_request_parts(parts, state).await;
        Ok(result.ok())
    }
}

/// Lenient counterpart of [`AuthUser`]: extraction always succeeds, and any
/// failure along the way yields the anonymous identity.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<User>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let result = <AuthUser as FromRequestParts<S>>::from_request_parts(parts, state).await;
        Ok(MaybeAuthUser(result.ok().map(|auth_user| auth_user.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn request_parts(auth_header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = auth_header {
            builder = builder.header("Authorization", value);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    /// Test that the strict extractor rejects a missing Authorization header
    #[tokio::test]
    async fn test_auth_user_rejects_missing_header() {
        let mut parts = request_parts(None);
        let result = <AuthUser as FromRequestParts<()>>::from_request_parts(&mut parts, &()).await;
        assert!(result.is_err());

        let response = result.unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    /// Test that the strict extractor rejects an unverifiable token
    #[tokio::test]
    async fn test_auth_user_rejects_garbage_token() {
        let mut parts = request_parts(Some("Bearer not-a-jwt"));
        let result = <AuthUser as FromRequestParts<()>>::from_request_parts(&mut parts, &()).await;
        assert!(result.is_err());
    }

    /// Test that the lenient extractor yields the anonymous identity
    /// instead of rejecting
    #[tokio::test]
    async fn test_maybe_auth_user_never_rejects() {
        let mut parts = request_parts(None);
        let MaybeAuthUser(user) =
            <MaybeAuthUser as FromRequestParts<()>>::from_request_parts(&mut parts, &())
                .await
                .unwrap();
        assert!(user.is_none());

        let mut parts = request_parts(Some("Bearer not-a-jwt"));
        let MaybeAuthUser(user) =
            <MaybeAuthUser as FromRequestParts<()>>::from_request_parts(&mut parts, &())
                .await
                .unwrap();
        assert!(user.is_none());
    }
}
