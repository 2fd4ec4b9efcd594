use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{io, paths, Outcome, StoreError, StoreResult};

/// A stored student record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    pub hall_ticket: String,
    pub email: String,
    pub gpa: f64,
    /// Cohort label ("I".."IV" unless the client supplied one); `year` on the wire.
    #[serde(rename = "year")]
    pub cohort_label: String,
}

/// A validated record waiting for an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStudent {
    pub hall_ticket: String,
    pub email: String,
    pub gpa: f64,
    pub cohort_label: String,
}

/// Partial update. Absent fields are left alone; `id` cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    #[serde(default)]
    pub hall_ticket: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub gpa: Option<f64>,
    #[serde(default, rename = "year")]
    pub cohort_label: Option<String>,
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        self.hall_ticket.is_none() && self.email.is_none() && self.gpa.is_none() && self.cohort_label.is_none()
    }

    pub fn apply_to(&self, rec: &mut StudentRecord) {
        if let Some(v) = &self.hall_ticket { rec.hall_ticket = v.clone(); }
        if let Some(v) = &self.email { rec.email = v.clone(); }
        if let Some(v) = self.gpa { rec.gpa = v; }
        if let Some(v) = &self.cohort_label { rec.cohort_label = v.clone(); }
    }
}

/// Query shapes the repository needs from a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentFilter {
    Id(String),
    HallTicket(String),
    Email(String),
}

impl StudentFilter {
    pub fn matches(&self, rec: &StudentRecord) -> bool {
        match self {
            StudentFilter::Id(id) => rec.id == *id,
            StudentFilter::HallTicket(ht) => rec.hall_ticket == *ht,
            StudentFilter::Email(e) => rec.email == *e,
        }
    }
}

/// One partition's worth of student records.
///
/// Every method is a single store round trip; nothing here spans two calls, so
/// callers composing a read with a write get no isolation between them.
#[async_trait]
pub trait StudentCollection: Send + Sync {
    fn name(&self) -> &str;

    async fn find_all(&self) -> StoreResult<Vec<StudentRecord>>;

    /// First record matching `filter`, in insertion order.
    async fn find_one(&self, filter: &StudentFilter) -> StoreResult<Option<StudentRecord>>;

    /// Assign an id and store the record. No uniqueness check.
    async fn insert(&self, student: NewStudent) -> StoreResult<StudentRecord>;

    /// Merge `patch` into the record with `id`; `None` when no such record.
    async fn update_by_id(&self, id: &str, patch: &StudentPatch) -> StoreResult<Option<StudentRecord>>;

    /// Remove the first record matching `filter` and return it.
    async fn delete_one(&self, filter: &StudentFilter) -> StoreResult<Option<StudentRecord>>;
}

/// Where a collection's rows are kept.
#[derive(Debug, Clone)]
enum Backing {
    Memory,
    /// Each change is written here before it becomes visible.
    Snapshot(PathBuf),
    /// The snapshot could not be read. Writes are refused so it is never overwritten.
    Unavailable,
}

/// In-process collection with optional snapshot persistence.
#[derive(Clone)]
pub struct MemoryCollection {
    name: String,
    rows: Arc<RwLock<Vec<StudentRecord>>>,
    backing: Backing,
    /// One writer at a time, so snapshots land in commit order.
    writer: Arc<tokio::sync::Mutex<()>>,
}

impl MemoryCollection {
    fn with_backing(name: String, rows: Vec<StudentRecord>, backing: Backing) -> Self {
        Self { name, rows: Arc::new(RwLock::new(rows)), backing, writer: Arc::new(tokio::sync::Mutex::new(())) }
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self::with_backing(name.into(), Vec::new(), Backing::Memory)
    }

    /// Open `<root>/<name>/snapshot.bin`, loading existing rows. Later mutations are
    /// written back to the same file.
    pub fn open(root: &Path, name: &str) -> StoreResult<Self> {
        let path = paths::snapshot_path(root, name);
        let rows = io::load_snapshot::<StudentRecord>(&path)?.unwrap_or_default();
        debug!(collection = name, rows = rows.len(), "collection opened");
        Ok(Self::with_backing(name.to_string(), rows, Backing::Snapshot(path)))
    }

    /// Empty collection that refuses every write with [`StoreError::Unavailable`].
    pub fn unavailable(name: impl Into<String>) -> Self {
        Self::with_backing(name.into(), Vec::new(), Backing::Unavailable)
    }

    /// Apply `op` to the rows. With a snapshot, `op` runs on a copy that replaces the
    /// live rows only after it has been written; a failed write changes nothing.
    async fn mutate<R, F>(&self, op: F) -> StoreResult<R>
    where
        F: FnOnce(&mut Vec<StudentRecord>) -> Outcome<R> + Send,
        R: Send,
    {
        match &self.backing {
            Backing::Memory => {
                let mut rows = self.rows.write();
                Ok(op(&mut *rows).into_inner())
            }
            Backing::Unavailable => {
                warn!(collection = %self.name, "write refused, snapshot could not be loaded");
                Err(StoreError::Unavailable(self.name.clone()))
            }
            Backing::Snapshot(path) => {
                let _writer = self.writer.lock().await;
                let mut next = self.rows.read().clone();
                let out = match op(&mut next) {
                    Outcome::Unchanged(r) => return Ok(r),
                    Outcome::Changed(r) => r,
                };
                let next = io::write_snapshot(path.clone(), next).await?;
                *self.rows.write() = next;
                Ok(out)
            }
        }
    }
}

#[async_trait]
impl StudentCollection for MemoryCollection {
    fn name(&self) -> &str { &self.name }

    async fn find_all(&self) -> StoreResult<Vec<StudentRecord>> {
        Ok(self.rows.read().clone())
    }

    async fn find_one(&self, filter: &StudentFilter) -> StoreResult<Option<StudentRecord>> {
        Ok(self.rows.read().iter().find(|r| filter.matches(r)).cloned())
    }

    async fn insert(&self, student: NewStudent) -> StoreResult<StudentRecord> {
        let rec = StudentRecord {
            id: uuid::Uuid::new_v4().simple().to_string(),
            hall_ticket: student.hall_ticket,
            email: student.email,
            gpa: student.gpa,
            cohort_label: student.cohort_label,
        };
        self.mutate(move |rows| {
            rows.push(rec.clone());
            Outcome::Changed(rec)
        })
        .await
    }

    async fn update_by_id(&self, id: &str, patch: &StudentPatch) -> StoreResult<Option<StudentRecord>> {
        self.mutate(|rows| match rows.iter_mut().find(|r| r.id == id) {
            Some(rec) => {
                patch.apply_to(rec);
                Outcome::Changed(Some(rec.clone()))
            }
            None => Outcome::Unchanged(None),
        })
        .await
    }

    async fn delete_one(&self, filter: &StudentFilter) -> StoreResult<Option<StudentRecord>> {
        self.mutate(|rows| match rows.iter().position(|r| filter.matches(r)) {
            Some(pos) => Outcome::Changed(Some(rows.remove(pos))),
            None => Outcome::Unchanged(None),
        })
        .await
    }
}
