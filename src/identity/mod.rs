//! Account identity: registration and login, stateless session tokens, and
//! static API key resolution.
//! Keep the public surface thin and split implementation across sub-modules.

mod keys;
mod principal;
mod provider;
mod session;

use crate::storage::StoreError;

pub use keys::KeyAuthenticator;
pub use principal::Principal;
pub use provider::{AccountService, LoginOutcome, LoginRequest, RegisterRequest};
pub use session::{bearer_token, SessionClaims, SessionManager, SessionToken};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid session token")]
    InvalidToken,
    #[error("session token expired")]
    Expired,
    #[error("missing api key")]
    MissingKey,
    #[error("invalid api key")]
    InvalidKey,
    #[error(transparent)]
    Store(#[from] StoreError),
}
