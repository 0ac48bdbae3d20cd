mod errors;
mod storage;
mod types;

pub use errors::UserError;
pub(crate) use storage::{UserStore, VendorStoreStore};
pub use types::{User, VendorStore};
pub(crate) use types::{ROLE_USER, ROLE_VENDOR, UserSearchField};

pub(crate) async fn init() -> Result<(), UserError> {
    UserStore::init().await?;
    VendorStoreStore::init().await?;
    Ok(())
}
