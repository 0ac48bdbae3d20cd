mod apple;
mod google;
mod idtoken;

pub use idtoken::TokenVerificationError;

pub(crate) use apple::verify_apple_token;
pub(crate) use google::verify_google_token;
