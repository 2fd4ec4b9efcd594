//! Record repository: create/read/update/delete against one cohort's collection.
//!
//! Uniqueness of `hallTicket` and `email` within a cohort is checked here, at write
//! time, with a lookup followed by an insert. The two calls are separate store
//! round trips, so concurrent creates of the same hall ticket can both pass the
//! lookup and both insert. Updates do not re-check uniqueness.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::try_join_all;
use serde::Deserialize;
use tracing::debug;

use crate::cohort::Cohort;
use crate::storage::{self, NewStudent, PartitionRegistry, StoreError, StoreResult, StudentCollection, StudentFilter, StudentPatch, StudentRecord};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

const GPA_MIN: f64 = 0.0;
const GPA_MAX: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    HallTicket,
    Email,
}

impl DuplicateField {
    pub fn label(self) -> &'static str {
        match self {
            DuplicateField::HallTicket => "hall ticket",
            DuplicateField::Email => "email",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("{0}")]
    Invalid(String),
    #[error("provide hallticket or email")]
    MissingCriteria,
    #[error("{} already exists", .0.label())]
    Conflict(DuplicateField),
    #[error("student not found")]
    NotFound,
    #[error("store call '{op}' timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Body of a create request, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCandidate {
    #[serde(default)]
    pub hall_ticket: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub gpa: Option<f64>,
    #[serde(default, rename = "year")]
    pub cohort_label: Option<String>,
}

/// Search query string: `?hallticket=` or `?email=`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default, rename = "hallticket")]
    pub hall_ticket: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl SearchQuery {
    /// Hall ticket wins when both are given. Blank values count as absent.
    pub fn criteria(&self) -> RepoResult<StudentFilter> {
        let non_blank = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        if let Some(ht) = non_blank(&self.hall_ticket) {
            return Ok(StudentFilter::HallTicket(ht));
        }
        if let Some(email) = non_blank(&self.email) {
            return Ok(StudentFilter::Email(email));
        }
        Err(RepoError::MissingCriteria)
    }
}

fn check_gpa(gpa: f64) -> RepoResult<()> {
    if !gpa.is_finite() || !(GPA_MIN..=GPA_MAX).contains(&gpa) {
        return Err(RepoError::Invalid(format!("gpa must be between {GPA_MIN} and {GPA_MAX}")));
    }
    Ok(())
}

fn required(field: &str, v: Option<&str>) -> RepoResult<String> {
    match v.map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(RepoError::Invalid(format!("{field} is required"))),
    }
}

impl StudentCandidate {
    fn validate(&self, cohort: Cohort) -> RepoResult<NewStudent> {
        let hall_ticket = required("hallTicket", self.hall_ticket.as_deref())?;
        let email = required("email", self.email.as_deref())?;
        let gpa = self.gpa.ok_or_else(|| RepoError::Invalid("gpa is required".into()))?;
        check_gpa(gpa)?;
        let cohort_label = self
            .cohort_label
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(cohort.roman())
            .to_string();
        Ok(NewStudent { hall_ticket, email, gpa, cohort_label })
    }
}

/// Operations scoped to a single resolved cohort.
#[derive(Clone)]
pub struct RecordRepository {
    cohort: Cohort,
    collection: Arc<dyn StudentCollection>,
    timeout: Duration,
}

impl RecordRepository {
    pub fn new(cohort: Cohort, collection: Arc<dyn StudentCollection>, timeout: Duration) -> Self {
        Self { cohort, collection, timeout }
    }

    /// Resolve `cohort` through the registry.
    pub fn for_cohort(registry: &PartitionRegistry, cohort: Cohort, timeout: Duration) -> Self {
        Self::new(cohort, registry.resolve(cohort), timeout)
    }

    pub fn cohort(&self) -> Cohort { self.cohort }

    async fn bounded<T>(&self, op: &'static str, fut: impl Future<Output = StoreResult<T>>) -> RepoResult<T> {
        storage::bounded(self.timeout, op, fut).await.map_err(|e| match e {
            StoreError::Timeout { op, after } => RepoError::Timeout { op, after },
            other => RepoError::Store(other),
        })
    }

    pub async fn list_all(&self) -> RepoResult<Vec<StudentRecord>> {
        self.bounded("find_all", self.collection.find_all()).await
    }

    /// Insert unless a record with the same hall ticket or email exists. A hall
    /// ticket clash is reported ahead of an email clash.
    pub async fn create(&self, candidate: &StudentCandidate) -> RepoResult<StudentRecord> {
        let student = candidate.validate(self.cohort)?;
        let checks = [
            (DuplicateField::HallTicket, StudentFilter::HallTicket(student.hall_ticket.clone())),
            (DuplicateField::Email, StudentFilter::Email(student.email.clone())),
        ];
        for (field, filter) in checks {
            if self.bounded("find_one", self.collection.find_one(&filter)).await?.is_some() {
                debug!(cohort = %self.cohort, field = field.label(), "duplicate student rejected");
                return Err(RepoError::Conflict(field));
            }
        }
        let rec = self.bounded("insert", self.collection.insert(student)).await?;
        debug!(cohort = %self.cohort, id = %rec.id, "student created");
        Ok(rec)
    }

    pub async fn update(&self, id: &str, patch: &StudentPatch) -> RepoResult<StudentRecord> {
        if let Some(gpa) = patch.gpa { check_gpa(gpa)?; }
        self.bounded("update_by_id", self.collection.update_by_id(id, patch))
            .await?
            .ok_or(RepoError::NotFound)
    }

    pub async fn delete(&self, hall_ticket: &str) -> RepoResult<StudentRecord> {
        let filter = StudentFilter::HallTicket(hall_ticket.to_string());
        self.bounded("delete_one", self.collection.delete_one(&filter))
            .await?
            .ok_or(RepoError::NotFound)
    }

    pub async fn search(&self, query: &SearchQuery) -> RepoResult<StudentRecord> {
        let filter = query.criteria()?;
        self.bounded("find_one", self.collection.find_one(&filter))
            .await?
            .ok_or(RepoError::NotFound)
    }
}

/// Every cohort's records, concatenated in year order.
pub async fn list_every_cohort(registry: &PartitionRegistry, timeout: Duration) -> RepoResult<Vec<StudentRecord>> {
    let repos: Vec<RecordRepository> = Cohort::ALL.iter().map(|c| RecordRepository::for_cohort(registry, *c, timeout)).collect();
    let per_cohort = try_join_all(repos.iter().map(|r| r.list_all())).await?;
    Ok(per_cohort.into_iter().flatten().collect())
}

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;
