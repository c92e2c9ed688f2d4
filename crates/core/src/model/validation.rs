use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::{SetId, StudentCoreId, SubmissionId, TaskId};
use super::submission::AnswerValue;

/// Per-task result produced by the external task validator. The
/// validator alone judges answers; this pipeline only rolls its results
/// up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskValidation {
    pub task_id: TaskId,
    pub answered_count: u32,
    pub total_count: u32,
    pub terminated: bool,
    pub has_post_termination_answers: bool,
}

impl TaskValidation {
    /// A task counts as complete only when every item was answered and
    /// there was at least one item to answer.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total_count > 0 && self.answered_count == self.total_count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionStatus {
    NotStarted,
    Incomplete,
    Complete,
}

/// Ordered per-task line within a set status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: TaskId,
    pub complete: bool,
    pub answered_count: u32,
    pub total_count: u32,
    pub terminated: bool,
}

/// Completion rollup for one set of logical tasks.
///
/// `tasks_total` counts the logical tasks observed in the student's own
/// validation map, not the full expected section count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStatus {
    pub set_id: SetId,
    pub status: CompletionStatus,
    pub tasks_complete: u32,
    pub tasks_total: u32,
    pub tasks: Vec<TaskSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationSummary {
    pub terminated_tasks: u32,
    pub tasks_with_post_termination_answers: u32,
}

/// Successful per-student build output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentValidation {
    pub submission_ids: Vec<SubmissionId>,
    pub merged_answers: BTreeMap<String, AnswerValue>,
    pub task_validations: BTreeMap<String, TaskValidation>,
    pub set_statuses: Vec<SetStatus>,
    pub overall_status: CompletionStatus,
    pub completion_percentage: f64,
    pub termination_summary: TerminationSummary,
}

/// A failed validator call is isolated to the one student: the record
/// carries the error marker instead of aborting the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Validated(StudentValidation),
    Failed {
        error: String,
        failed_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub core_id: StudentCoreId,
    pub outcome: ValidationOutcome,
}

impl ValidationRecord {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, ValidationOutcome::Failed { .. })
    }
}
