use chrono::Utc;

use crate::token::{TokenPair, issue_token_pair};
use crate::userdb::{User, UserSearchField, UserStore};
use crate::wallet::{consume_nonce, issue_nonce, verify_wallet_signature};

use super::errors::CoordinationError;
use super::role::resolve_role;
use super::user::gen_new_user_id;

/// Issue a sign-in message for a wallet address.
///
/// The wallet endpoint is called twice: once without a signature to obtain
/// the message, then again with the signed message.
pub async fn request_wallet_nonce(address: &str) -> Result<String, CoordinationError> {
    let message = issue_nonce(address).await?;
    Ok(message)
}

/// Sign a user in with a wallet signature.
///
/// The supplied message must be the one issued for this address and the
/// EIP-191 signature must recover to the claimed address. On success the
/// account keyed by the lowercased address is signed in, created first if
/// necessary.
#[tracing::instrument(skip(message, signature))]
pub async fn wallet_sign_in(
    address: &str,
    message: &str,
    signature: &str,
) -> Result<(User, TokenPair), CoordinationError> {
    let issued = consume_nonce(address).await?;
    if issued != message {
        return Err(CoordinationError::InvalidRequest(
            "Message does not match the issued nonce".to_string(),
        )
        .log());
    }

    verify_wallet_signature(address, message, signature)?;

    let address = address.to_lowercase();
    let mut user = match UserStore::get_user_by(UserSearchField::WalletAddress(address.clone()))
        .await?
    {
        Some(user) => user,
        None => {
            let mut new_user = User::new(
                gen_new_user_id().await?,
                None,
                shorten_address(&address),
            );
            new_user.wallet_address = Some(address.clone());
            new_user.updated_at = Utc::now();
            tracing::info!(address = %address, "Creating user for wallet address");
            UserStore::upsert_user(new_user).await?
        }
    };

    user.role = resolve_role(&user.id).await?;
    let tokens = issue_token_pair(&user.id).await?;

    tracing::info!(user_id = %user.id, "Wallet sign-in");
    Ok((user, tokens))
}

/// Default display name for a wallet-only account, e.g. `0x1234…cdef`.
fn shorten_address(address: &str) -> String {
    if address.len() > 10 {
        format!("{}…{}", &address[..6], &address[address.len() - 4..])
    } else {
        address.to_string()
    }
}
