use serde::{Deserialize, Serialize};

/// Identity carried by a verified session token.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub account_id: String,
    pub email: String,
}
