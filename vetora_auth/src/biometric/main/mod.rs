mod auth;
mod challenge;
mod register;

pub(crate) use auth::{finish_authentication, start_authentication};
pub(crate) use register::{finish_registration, start_registration};
