#![forbid(unsafe_code)]

pub mod error;
pub mod merge_ingest;
pub mod submission_api;
pub mod submission_cache;
pub mod validation_cache;
pub mod validator;

pub use survey_core::Clock;

pub use error::{BuildError, SubmissionCacheError, ValidatorError};
pub use merge_ingest::merged_to_submissions;
pub use submission_api::{ApiConfig, Credentials, HttpSubmissionApi, SubmissionSource};
pub use submission_cache::SubmissionCacheService;
pub use validation_cache::ValidationCacheService;
pub use validator::TaskValidator;
