use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Apple,
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Google => write!(f, "google"),
            Self::Apple => write!(f, "apple"),
        }
    }
}

/// Identity extracted from a verified provider id token.
///
/// Apple tokens often carry no name and sometimes no email, so both
/// stay optional here and the caller fills in fallbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthIdentity {
    pub provider: OAuthProvider,
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
}
