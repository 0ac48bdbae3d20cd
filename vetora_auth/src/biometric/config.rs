use std::{env, sync::LazyLock};

/// Web origin the relying party is served from, checked against the
/// origin reported in clientDataJSON
pub(super) static ORIGIN: LazyLock<String> =
    LazyLock::new(|| std::env::var("FRONTEND_URL").expect("FRONTEND_URL must be set"));

pub(super) static WEBAUTHN_RP_ID: LazyLock<String> = LazyLock::new(|| {
    env::var("RP_ID").ok().unwrap_or_else(|| {
        ORIGIN
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .split(':')
            .next()
            .map(|s| s.to_string())
            .expect("Could not extract RP ID from FRONTEND_URL")
    })
});

pub(super) static WEBAUTHN_RP_NAME: LazyLock<String> =
    LazyLock::new(|| env::var("RP_NAME").ok().unwrap_or("Vetora".to_string()));

/// Registration challenge lifetime in seconds
pub(super) static WEBAUTHN_TIMEOUT: LazyLock<u32> = LazyLock::new(|| {
    env::var("WEBAUTHN_TIMEOUT")
        .map(|v| v.parse::<u32>().unwrap_or(300))
        .unwrap_or(300)
});

/// Authentication challenge lifetime in seconds, shorter than the
/// registration window
pub(super) static AUTH_CHALLENGE_TIMEOUT: LazyLock<u32> = LazyLock::new(|| {
    env::var("AUTH_CHALLENGE_TIMEOUT")
        .map(|v| v.parse::<u32>().unwrap_or(120))
        .unwrap_or(120)
});

pub(super) static WEBAUTHN_ATTESTATION: LazyLock<String> =
    LazyLock::new(|| match env::var("WEBAUTHN_ATTESTATION").ok() {
        None => "none".to_string(),
        Some(v) => match v.to_lowercase().as_str() {
            "none" => "none".to_string(),
            "direct" => "direct".to_string(),
            "indirect" => "indirect".to_string(),
            invalid => {
                tracing::warn!("Invalid attestation: {}. Using default 'none'", invalid);
                "none".to_string()
            }
        },
    });

pub(super) static WEBAUTHN_USER_VERIFICATION: LazyLock<String> = LazyLock::new(|| {
    env::var("WEBAUTHN_USER_VERIFICATION").map_or(
        "preferred".to_string(), // Default to preferred
        |v| match v.to_lowercase().as_str() {
            "required" => "required".to_string(),
            "preferred" => "preferred".to_string(),
            "discouraged" => "discouraged".to_string(),
            _ => {
                tracing::warn!("Invalid user verification: {}. Using default 'preferred'", v);
                "preferred".to_string()
            }
        },
    )
});

/// Most outstanding authentication challenges kept per user; older
/// entries are evicted when the cap is reached
pub(super) const MAX_AUTH_CHALLENGES: i64 = 5;

/// Most recent-device records kept per user
pub(super) const MAX_RECENT_DEVICES: i64 = 10;
