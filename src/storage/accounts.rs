use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{io, paths, Outcome, StoreError, StoreResult};

/// An account owner. `api_key` is the plaintext static key, set at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub api_key: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub dob: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub dob: Option<String>,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account. Fails with [`StoreError::DuplicateEmail`] if the email is taken.
    async fn insert(&self, account: NewAccount) -> StoreResult<Account>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Account>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    /// Exact match on the static key.
    async fn find_by_api_key(&self, key: &str) -> StoreResult<Option<Account>>;

    /// Store `candidate` as the account's static key unless one is already set, and
    /// return whichever key the account holds afterwards.
    async fn assign_api_key_once(&self, id: &str, candidate: String) -> StoreResult<String>;
}

#[derive(Clone, Default)]
struct AccountTable {
    rows: HashMap<String, Account>,
    by_email: HashMap<String, String>,
    by_key: HashMap<String, String>,
}

impl AccountTable {
    fn from_rows(accounts: Vec<Account>) -> Self {
        let mut t = AccountTable::default();
        for a in accounts {
            t.by_email.insert(a.email.clone(), a.id.clone());
            if let Some(k) = &a.api_key { t.by_key.insert(k.clone(), a.id.clone()); }
            t.rows.insert(a.id.clone(), a);
        }
        t
    }

    fn lookup(&self, index: &HashMap<String, String>, key: &str) -> Option<Account> {
        index.get(key).and_then(|id| self.rows.get(id)).cloned()
    }

    /// Rows in creation order, as written to the snapshot.
    fn sorted_rows(&self) -> Vec<Account> {
        let mut rows: Vec<Account> = self.rows.values().cloned().collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        rows
    }
}

/// In-process credential store with optional snapshot persistence.
#[derive(Clone, Default)]
pub struct MemoryAccountStore {
    table: Arc<RwLock<AccountTable>>,
    snapshot: Option<PathBuf>,
    /// One writer at a time, so snapshots land in commit order.
    writer: Arc<tokio::sync::Mutex<()>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self { Self::default() }

    /// Open the credential store under `root`, loading `accounts/snapshot.bin` if present.
    pub fn open(root: &Path) -> StoreResult<Self> {
        let path = paths::accounts_snapshot_path(root);
        let rows = io::load_snapshot::<Account>(&path)?.unwrap_or_default();
        debug!(accounts = rows.len(), "credential store opened");
        Ok(Self {
            table: Arc::new(RwLock::new(AccountTable::from_rows(rows))),
            snapshot: Some(path),
            writer: Arc::default(),
        })
    }

    pub fn len(&self) -> usize { self.table.read().rows.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Apply `op` to the table. With a snapshot, `op` runs on a copy that replaces the
    /// live table only after it has been written; a failed write changes nothing.
    async fn mutate<R, F>(&self, op: F) -> StoreResult<R>
    where
        F: FnOnce(&mut AccountTable) -> StoreResult<Outcome<R>> + Send,
        R: Send,
    {
        let Some(path) = &self.snapshot else {
            let mut t = self.table.write();
            return op(&mut *t).map(Outcome::into_inner);
        };
        let _writer = self.writer.lock().await;
        let mut next = self.table.read().clone();
        let out = match op(&mut next)? {
            Outcome::Unchanged(r) => return Ok(r),
            Outcome::Changed(r) => r,
        };
        io::write_snapshot(path.clone(), next.sorted_rows()).await?;
        *self.table.write() = next;
        Ok(out)
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn insert(&self, account: NewAccount) -> StoreResult<Account> {
        let row = Account {
            id: uuid::Uuid::new_v4().simple().to_string(),
            email: account.email,
            password_hash: account.password_hash,
            api_key: None,
            first_name: account.first_name,
            last_name: account.last_name,
            dob: account.dob,
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        self.mutate(move |t| {
            if t.by_email.contains_key(&row.email) {
                return Err(StoreError::DuplicateEmail(row.email));
            }
            t.by_email.insert(row.email.clone(), row.id.clone());
            t.rows.insert(row.id.clone(), row.clone());
            Ok(Outcome::Changed(row))
        })
        .await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Account>> {
        Ok(self.table.read().rows.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let r = self.table.read();
        Ok(r.lookup(&r.by_email, email))
    }

    async fn find_by_api_key(&self, key: &str) -> StoreResult<Option<Account>> {
        let r = self.table.read();
        Ok(r.lookup(&r.by_key, key))
    }

    async fn assign_api_key_once(&self, id: &str, candidate: String) -> StoreResult<String> {
        self.mutate(move |t| {
            let Some(row) = t.rows.get_mut(id) else {
                return Err(StoreError::AccountNotFound(id.to_string()));
            };
            if let Some(existing) = &row.api_key {
                return Ok(Outcome::Unchanged(existing.clone()));
            }
            row.api_key = Some(candidate.clone());
            t.by_key.insert(candidate.clone(), id.to_string());
            Ok(Outcome::Changed(candidate))
        })
        .await
    }
}
