use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::AuthError;
use crate::storage::{self, Account, AccountStore};

/// Resolves a static API key to the account that owns it. Keys come from a path
/// segment on the legacy routes and from `x-api-key` on the rest; both end up here.
#[derive(Clone)]
pub struct KeyAuthenticator {
    accounts: Arc<dyn AccountStore>,
    timeout: Duration,
}

impl KeyAuthenticator {
    pub fn new(accounts: Arc<dyn AccountStore>, timeout: Duration) -> Self { Self { accounts, timeout } }

    pub async fn resolve(&self, key: Option<&str>) -> Result<Account, AuthError> {
        let key = key.map(str::trim).filter(|k| !k.is_empty()).ok_or(AuthError::MissingKey)?;
        match storage::bounded(self.timeout, "find_by_api_key", self.accounts.find_by_api_key(key)).await? {
            Some(account) => Ok(account),
            None => {
                debug!("api key rejected");
                Err(AuthError::InvalidKey)
            }
        }
    }
}
