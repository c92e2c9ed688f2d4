use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use survey_core::model::{StudentCoreId, Submission, ValidationRecord};

/// Schema version written into validation snapshots. Bumped on any
/// structural change; a mismatching snapshot is discarded before any
/// field is inspected.
pub const VALIDATION_SCHEMA_VERSION: u32 = 2;

/// Errors surfaced by snapshot stores.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape of the remote submission dataset.
///
/// A snapshot is trusted only when it is both structurally valid and
/// fresh; neither check is sufficient alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionSnapshot {
    pub submissions: Vec<Submission>,
    pub fetched_at: DateTime<Utc>,
    pub record_count: usize,
}

impl SubmissionSnapshot {
    #[must_use]
    pub fn new(submissions: Vec<Submission>, fetched_at: DateTime<Utc>) -> Self {
        let record_count = submissions.len();
        Self {
            submissions,
            fetched_at,
            record_count,
        }
    }

    /// Shape checks: non-empty payload, stored count matching the
    /// sequence length, and a first element carrying an id and answers.
    #[must_use]
    pub fn structurally_valid(&self) -> bool {
        let Some(first) = self.submissions.first() else {
            return false;
        };
        self.record_count == self.submissions.len()
            && !first.id.as_str().is_empty()
            && !first.answers.is_empty()
    }

    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.fetched_at < ttl
    }

    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.structurally_valid() && self.is_fresh(now, ttl)
    }
}

/// Persisted shape of a validation build: one record per roster student,
/// tagged with the schema version for forward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSnapshot {
    pub validations: HashMap<StudentCoreId, ValidationRecord>,
    pub fetched_at: DateTime<Utc>,
    pub record_count: usize,
    pub version: u32,
}

impl ValidationSnapshot {
    #[must_use]
    pub fn new(
        validations: HashMap<StudentCoreId, ValidationRecord>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let record_count = validations.len();
        Self {
            validations,
            fetched_at,
            record_count,
            version: VALIDATION_SCHEMA_VERSION,
        }
    }

    /// Version tag first, shape second.
    #[must_use]
    pub fn structurally_valid(&self) -> bool {
        self.version == VALIDATION_SCHEMA_VERSION
            && !self.validations.is_empty()
            && self.record_count == self.validations.len()
    }

    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.fetched_at < ttl
    }

    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.structurally_valid() && self.is_fresh(now, ttl)
    }
}

/// Store contract for the submission snapshot. Replacement is always
/// whole-snapshot: one `save` supersedes the previous entry atomically.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Load the current snapshot, if one was persisted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be read.
    async fn load(&self) -> Result<Option<SubmissionSnapshot>, StorageError>;

    /// Persist `snapshot`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be written.
    async fn save(&self, snapshot: &SubmissionSnapshot) -> Result<(), StorageError>;

    /// Drop the snapshot so the next access rebuilds it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// Store contract for the validation snapshot.
#[async_trait]
pub trait ValidationStore: Send + Sync {
    /// Load the current snapshot, if one was persisted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be read.
    async fn load(&self) -> Result<Option<ValidationSnapshot>, StorageError>;

    /// Persist `snapshot`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be written.
    async fn save(&self, snapshot: &ValidationSnapshot) -> Result<(), StorageError>;

    /// Drop the snapshot so the next build recomputes.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// In-memory store for tests and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    submissions: Arc<Mutex<Option<SubmissionSnapshot>>>,
    validations: Arc<Mutex<Option<ValidationSnapshot>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionStore for InMemoryStore {
    async fn load(&self) -> Result<Option<SubmissionSnapshot>, StorageError> {
        let guard = self
            .submissions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn save(&self, snapshot: &SubmissionSnapshot) -> Result<(), StorageError> {
        let mut guard = self
            .submissions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(snapshot.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self
            .submissions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = None;
        Ok(())
    }
}

#[async_trait]
impl ValidationStore for InMemoryStore {
    async fn load(&self) -> Result<Option<ValidationSnapshot>, StorageError> {
        let guard = self
            .validations
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn save(&self, snapshot: &ValidationSnapshot) -> Result<(), StorageError> {
        let mut guard = self
            .validations
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(snapshot.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self
            .validations
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = None;
        Ok(())
    }
}

/// Bundles the two independent stores behind trait objects so backends
/// can be swapped without touching the services.
#[derive(Clone)]
pub struct Storage {
    pub submissions: Arc<dyn SubmissionStore>,
    pub validations: Arc<dyn ValidationStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let store = InMemoryStore::new();
        let submissions: Arc<dyn SubmissionStore> = Arc::new(store.clone());
        let validations: Arc<dyn ValidationStore> = Arc::new(store);
        Self {
            submissions,
            validations,
        }
    }
}
