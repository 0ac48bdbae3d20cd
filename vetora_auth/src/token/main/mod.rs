mod issuer;

pub(crate) use issuer::{
    issue_token_pair, refresh_token_pair, revoke_refresh_token, verify_access_token,
};
