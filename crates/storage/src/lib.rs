#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    InMemoryStore, Storage, StorageError, SubmissionSnapshot, SubmissionStore,
    VALIDATION_SCHEMA_VERSION, ValidationSnapshot, ValidationStore,
};
pub use sqlite::SqliteInitError;
