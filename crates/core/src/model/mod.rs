pub mod ids;
pub mod student;
pub mod submission;
pub mod survey;
pub mod validation;

pub use ids::{SessionKey, SetId, StudentCoreId, SubmissionId, TaskId};
pub use student::{Gender, GenderParseError, Student};
pub use submission::{AnswerValue, Submission};
pub use survey::{
    GenderRule, LogicalTask, SectionDef, SetDef, SetTasks, SurveyStructure, TaskCatalog, TaskMeta,
    TaskVariant,
};
pub use validation::{
    CompletionStatus, SetStatus, StudentValidation, TaskSummary, TaskValidation,
    TerminationSummary, ValidationOutcome, ValidationRecord,
};
