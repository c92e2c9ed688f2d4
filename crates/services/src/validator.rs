use std::collections::BTreeMap;

use async_trait::async_trait;

use survey_core::model::{AnswerValue, TaskValidation};

use crate::error::ValidatorError;

/// External task validator: judges one student's merged answer set and
/// reports per-task results keyed by raw task name. Opaque to the
/// pipeline; whether an answer is substantively correct is entirely its
/// business. Modeled async because implementations may suspend.
#[async_trait]
pub trait TaskValidator: Send + Sync {
    /// Validate one merged answer set.
    ///
    /// # Errors
    ///
    /// Returns `ValidatorError` when the validator cannot produce a
    /// result; the caller isolates the failure to the one student.
    async fn validate(
        &self,
        merged_answers: &BTreeMap<String, AnswerValue>,
    ) -> Result<BTreeMap<String, TaskValidation>, ValidatorError>;
}
