use std::sync::LazyLock;

pub(super) static GOOGLE_CLIENT_ID: LazyLock<String> =
    LazyLock::new(|| std::env::var("GOOGLE_CLIENT_ID").expect("GOOGLE_CLIENT_ID must be set"));

pub(super) static APPLE_CLIENT_ID: LazyLock<String> =
    LazyLock::new(|| std::env::var("APPLE_CLIENT_ID").expect("APPLE_CLIENT_ID must be set"));

pub(super) const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Google issues tokens with either form of the issuer claim
pub(super) const GOOGLE_ISSUERS: &[&str] = &["https://accounts.google.com", "accounts.google.com"];

pub(super) const APPLE_JWKS_URL: &str = "https://appleid.apple.com/auth/keys";

pub(super) const APPLE_ISSUERS: &[&str] = &["https://appleid.apple.com"];
