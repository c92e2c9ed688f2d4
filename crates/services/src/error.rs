//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;

/// Errors emitted by `SubmissionCacheService`.
///
/// `Auth` and `RateLimited` are fatal for the current operation; there
/// is no built-in retry beyond the fixed inter-page delay. Structural
/// problems with a persisted snapshot never surface here — they trigger
/// a silent refetch instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmissionCacheError {
    #[error("submission API rejected the credentials")]
    Auth,
    #[error("submission API throttled the request (retry-after: {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },
    #[error("submission API request failed with status {0}")]
    Status(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("malformed submission payload: {0}")]
    Decode(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure reported by the external task validator for one student.
/// Always isolated to that student's record, never fatal for a build.
#[derive(Debug, Clone, Error)]
#[error("task validator failed: {0}")]
pub struct ValidatorError(pub String);

/// Errors that fail a whole validation build.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    #[error(transparent)]
    Cache(#[from] SubmissionCacheError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
