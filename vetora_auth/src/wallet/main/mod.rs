mod nonce;
mod verify;

pub(crate) use nonce::{consume_nonce, issue_nonce};
pub(crate) use verify::verify_wallet_signature;
