use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, info};

use super::principal::Principal;
use super::session::{SessionManager, SessionToken};
use crate::error::{AppError, AppResult};
use crate::security;
use crate::storage::{self, Account, AccountStore, NewAccount};
use crate::tprintln;

/// Body of `POST /register`. Every field is required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default, rename = "fName")]
    pub first_name: Option<String>,
    #[serde(default, rename = "lName")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success { token: SessionToken, name: Option<String> },
    UnknownUser,
    BadPassword,
}

fn trimmed(v: &Option<String>) -> Option<String> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Registration, login and static key management over an [`AccountStore`].
#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountStore>,
    sessions: Arc<SessionManager>,
    timeout: Duration,
}

impl AccountService {
    pub fn new(accounts: Arc<dyn AccountStore>, sessions: Arc<SessionManager>, timeout: Duration) -> Self {
        Self { accounts, sessions, timeout }
    }

    pub fn sessions(&self) -> &SessionManager { &self.sessions }

    pub async fn register(&self, req: &RegisterRequest) -> AppResult<Account> {
        let fields = (trimmed(&req.first_name), trimmed(&req.last_name), trimmed(&req.dob), trimmed(&req.email), trimmed(&req.password));
        let (Some(first_name), Some(last_name), Some(dob), Some(email), Some(password)) = fields else {
            return Err(AppError::user("missing_fields", "All fields are required"));
        };
        let password_hash = tokio::task::spawn_blocking(move || security::hash_password(&password))
            .await
            .context("password hashing task failed")??;
        let new = NewAccount { email, password_hash, first_name: Some(first_name), last_name: Some(last_name), dob: Some(dob) };
        let account = storage::bounded(self.timeout, "insert", self.accounts.insert(new)).await?;
        info!(account = %account.id, "account registered");
        Ok(account)
    }

    pub async fn login(&self, req: &LoginRequest) -> AppResult<LoginOutcome> {
        let Some(email) = trimmed(&req.email) else { return Ok(LoginOutcome::UnknownUser); };
        let Some(account) = storage::bounded(self.timeout, "find_by_email", self.accounts.find_by_email(&email)).await? else {
            debug!("login for unknown email");
            return Ok(LoginOutcome::UnknownUser);
        };
        let password = req.password.clone().unwrap_or_default();
        let hash = account.password_hash.clone();
        let ok = tokio::task::spawn_blocking(move || security::verify_password(&hash, &password))
            .await
            .context("password verification task failed")?;
        if !ok {
            debug!(account = %account.id, "login with wrong password");
            return Ok(LoginOutcome::BadPassword);
        }
        let principal = Principal { account_id: account.id.clone(), email: account.email.clone() };
        let token = self.sessions.issue(&principal);
        tprintln!("auth.login account={}", account.id);
        Ok(LoginOutcome::Success { token, name: account.first_name })
    }

    /// The caller's static key, if one has been generated.
    pub async fn get_api_key(&self, principal: &Principal) -> AppResult<Option<String>> {
        let account = storage::bounded(self.timeout, "find_by_id", self.accounts.find_by_id(&principal.account_id)).await?;
        Ok(account.and_then(|a| a.api_key))
    }

    /// Generate the caller's static key. Later calls return the first key.
    pub async fn generate_api_key(&self, principal: &Principal) -> AppResult<String> {
        let candidate = security::generate_api_key()?;
        let assign = self.accounts.assign_api_key_once(&principal.account_id, candidate);
        let key = storage::bounded(self.timeout, "assign_api_key_once", assign).await?;
        debug!(account = %principal.account_id, "api key issued");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::keys::tests::StalledAccounts;
    use crate::storage::MemoryAccountStore;

    fn service() -> AccountService {
        AccountService::new(
            Arc::new(MemoryAccountStore::new()),
            Arc::new(SessionManager::new(b"test-secret")),
            Duration::from_secs(5),
        )
    }

    fn register_req(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: Some(" Ada ".into()),
            last_name: Some("Lovelace".into()),
            email: Some(email.into()),
            dob: Some("2001-04-09".into()),
            password: Some(password.into()),
        }
    }

    #[tokio::test]
    async fn register_trims_and_hashes() {
        let svc = service();
        let acct = svc.register(&register_req(" ada@x.com ", "pw")).await.unwrap();
        assert_eq!(acct.email, "ada@x.com");
        assert_eq!(acct.first_name.as_deref(), Some("Ada"));
        assert_eq!(acct.dob.as_deref(), Some("2001-04-09"));
        assert!(acct.password_hash.starts_with("$argon2"));
        assert!(acct.api_key.is_none());
    }

    #[tokio::test]
    async fn register_requires_every_field() {
        let svc = service();
        let blanks = [
            register_req("", "pw"),
            register_req("a@x.com", "   "),
            RegisterRequest { first_name: None, ..register_req("a@x.com", "pw") },
            RegisterRequest { last_name: Some(" ".into()), ..register_req("a@x.com", "pw") },
            RegisterRequest { dob: None, ..register_req("a@x.com", "pw") },
        ];
        for req in &blanks {
            let err = svc.register(req).await.unwrap_err();
            assert_eq!(err.http_status(), 400);
            assert_eq!(err.message(), "All fields are required");
        }
        let login = LoginRequest { email: Some("a@x.com".into()), password: Some("pw".into()) };
        assert_eq!(svc.login(&login).await.unwrap(), LoginOutcome::UnknownUser);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let svc = service();
        svc.register(&register_req("a@x.com", "pw")).await.unwrap();
        let err = svc.register(&register_req("a@x.com", "other")).await.unwrap_err();
        assert_eq!(err.http_status(), 409);
    }

    #[tokio::test]
    async fn login_outcomes() {
        let svc = service();
        let acct = svc.register(&register_req("a@x.com", "pw")).await.unwrap();

        let unknown = LoginRequest { email: Some("b@x.com".into()), password: Some("pw".into()) };
        assert_eq!(svc.login(&unknown).await.unwrap(), LoginOutcome::UnknownUser);
        let bad = LoginRequest { email: Some("a@x.com".into()), password: Some("nope".into()) };
        assert_eq!(svc.login(&bad).await.unwrap(), LoginOutcome::BadPassword);

        let good = LoginRequest { email: Some("a@x.com".into()), password: Some("pw".into()) };
        match svc.login(&good).await.unwrap() {
            LoginOutcome::Success { token, name } => {
                assert_eq!(name.as_deref(), Some("Ada"));
                let claims = svc.sessions().verify(&token).unwrap();
                assert_eq!(claims.sub, acct.id);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn api_key_generation_is_idempotent() {
        let svc = service();
        let acct = svc.register(&register_req("a@x.com", "pw")).await.unwrap();
        let who = Principal { account_id: acct.id.clone(), email: acct.email.clone() };
        assert_eq!(svc.get_api_key(&who).await.unwrap(), None);
        let first = svc.generate_api_key(&who).await.unwrap();
        let second = svc.generate_api_key(&who).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert_eq!(svc.get_api_key(&who).await.unwrap(), Some(first));

        let ghost = Principal { account_id: "ghost".into(), email: "g@x.com".into() };
        assert_eq!(svc.generate_api_key(&ghost).await.unwrap_err().http_status(), 404);
    }

    #[tokio::test]
    async fn stalled_store_answers_store_timeout() {
        let svc = AccountService::new(Arc::new(StalledAccounts), Arc::new(SessionManager::new(b"k")), Duration::from_millis(20));
        let who = Principal { account_id: "a".into(), email: "a@x.com".into() };

        let err = svc.register(&register_req("a@x.com", "pw")).await.unwrap_err();
        assert_eq!((err.http_status(), err.code_str()), (500, "store_timeout"));
        let login = LoginRequest { email: Some("a@x.com".into()), password: Some("pw".into()) };
        assert_eq!(svc.login(&login).await.unwrap_err().code_str(), "store_timeout");
        assert_eq!(svc.get_api_key(&who).await.unwrap_err().code_str(), "store_timeout");
        assert_eq!(svc.generate_api_key(&who).await.unwrap_err().code_str(), "store_timeout");
    }
}
