use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use storage::repository::{ValidationSnapshot, ValidationStore};
use survey_core::Clock;
use survey_core::completion;
use survey_core::model::{
    Student, StudentCoreId, Submission, SurveyStructure, TaskCatalog, ValidationOutcome,
    ValidationRecord,
};
use survey_core::model::validation::StudentValidation;

use crate::error::BuildError;
use crate::submission_api::Credentials;
use crate::submission_cache::SubmissionCacheService;
use crate::validator::TaskValidator;

/// Builds and caches per-student validation records.
///
/// A usable persisted snapshot that covers the requested roster subset
/// is filtered, not recomputed; everything else triggers a full build
/// from the submission cache.
pub struct ValidationCacheService {
    submissions: Arc<SubmissionCacheService>,
    store: Arc<dyn ValidationStore>,
    validator: Arc<dyn TaskValidator>,
    clock: Clock,
    ttl: Duration,
    /// Semantic name of the answer holding the student identifier.
    student_field: String,
}

impl ValidationCacheService {
    #[must_use]
    pub fn new(
        submissions: Arc<SubmissionCacheService>,
        store: Arc<dyn ValidationStore>,
        validator: Arc<dyn TaskValidator>,
    ) -> Self {
        Self {
            submissions,
            store,
            validator,
            clock: Clock::system(),
            ttl: Duration::hours(1),
            student_field: "token".to_string(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_student_field(mut self, student_field: impl Into<String>) -> Self {
        self.student_field = student_field.into();
        self
    }

    /// Returns one record per requested student.
    ///
    /// A student whose validator call fails gets a `Failed` record; the
    /// batch always comes back complete, never with entries silently
    /// omitted.
    ///
    /// # Errors
    ///
    /// Returns `BuildError` only for whole-build failures: the upstream
    /// fetch (auth, throttling, transport) or the snapshot store.
    pub async fn build(
        &self,
        credentials: &Credentials,
        students: &[Student],
        structure: &SurveyStructure,
        force_rebuild: bool,
    ) -> Result<HashMap<StudentCoreId, ValidationRecord>, BuildError> {
        if !force_rebuild {
            if let Some(snapshot) = self.reusable_snapshot(students).await? {
                debug!(
                    requested = students.len(),
                    cached = snapshot.record_count,
                    "serving filtered validation snapshot"
                );
                return Ok(filter_to_roster(snapshot, students));
            }
        }

        let submissions = self.submissions.get_all(credentials).await?;
        let catalog = TaskCatalog::from_structure(structure);
        let mut grouped = group_by_student(students, submissions, &self.student_field);

        let mut validations = HashMap::with_capacity(students.len());
        for student in students {
            let student_submissions = grouped.remove(&student.core_id).unwrap_or_default();
            let record = self.build_record(student, student_submissions, &catalog).await;
            validations.insert(student.core_id.clone(), record);
        }

        let failed = validations.values().filter(|r| r.is_failed()).count();
        info!(
            students = validations.len(),
            failed, "validation build complete"
        );

        let snapshot = ValidationSnapshot::new(validations.clone(), self.clock.now());
        self.store.save(&snapshot).await?;
        Ok(validations)
    }

    /// Forces the next build to recompute.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::Storage` when the store cannot be cleared.
    pub async fn clear(&self) -> Result<(), BuildError> {
        self.store.clear().await?;
        Ok(())
    }

    async fn reusable_snapshot(
        &self,
        students: &[Student],
    ) -> Result<Option<ValidationSnapshot>, BuildError> {
        let Some(snapshot) = self.store.load().await? else {
            return Ok(None);
        };
        if !snapshot.structurally_valid() {
            debug!("validation snapshot failed structural checks; rebuilding");
            return Ok(None);
        }
        if !snapshot.is_fresh(self.clock.now(), self.ttl) {
            debug!("validation snapshot expired; rebuilding");
            return Ok(None);
        }
        // A snapshot older than its backing submission data is stale
        // even inside the TTL window.
        if let Some(backing) = self.submissions.last_fetched_at().await? {
            if backing > snapshot.fetched_at {
                debug!("submission snapshot is newer; rebuilding");
                return Ok(None);
            }
        }
        let covered = students
            .iter()
            .all(|student| snapshot.validations.contains_key(&student.core_id));
        if covered {
            Ok(Some(snapshot))
        } else {
            debug!("validation snapshot does not cover the requested roster subset");
            Ok(None)
        }
    }

    async fn build_record(
        &self,
        student: &Student,
        mut submissions: Vec<Submission>,
        catalog: &TaskCatalog,
    ) -> ValidationRecord {
        // Chronological ascending; ties keep fetch order.
        submissions.sort_by_key(|submission| submission.created_at);
        let submission_ids = submissions.iter().map(|s| s.id.clone()).collect();
        let merged_answers = merge_answers(&submissions);

        match self.validator.validate(&merged_answers).await {
            Ok(task_validations) => {
                let report = completion::aggregate(catalog, student.gender, &task_validations);
                ValidationRecord {
                    core_id: student.core_id.clone(),
                    outcome: ValidationOutcome::Validated(StudentValidation {
                        submission_ids,
                        merged_answers,
                        task_validations,
                        set_statuses: report.set_statuses,
                        overall_status: report.overall_status,
                        completion_percentage: report.completion_percentage,
                        termination_summary: report.termination_summary,
                    }),
                }
            }
            Err(err) => {
                warn!(
                    core_id = %student.core_id,
                    error = %err,
                    "task validator failed; isolating to this record"
                );
                ValidationRecord {
                    core_id: student.core_id.clone(),
                    outcome: ValidationOutcome::Failed {
                        error: err.to_string(),
                        failed_at: self.clock.now(),
                    },
                }
            }
        }
    }
}

/// Per-student answer merge: submissions in chronological ascending
/// order, and for every semantic field name the most recently created
/// submission wins. This is the within-student policy; the cross-source
/// policy in `survey_core::merge` is intentionally different.
fn merge_answers(
    submissions: &[Submission],
) -> BTreeMap<String, survey_core::model::AnswerValue> {
    let mut merged = BTreeMap::new();
    for submission in submissions {
        for answer in submission.answers.values() {
            merged.insert(answer.name.clone(), answer.clone());
        }
    }
    merged
}

/// Matches each submission to a roster student by comparing the
/// student-identifier answer against the roster id's numeric suffix.
/// Submissions matching nobody are left out (and logged at debug).
fn group_by_student(
    students: &[Student],
    submissions: Vec<Submission>,
    student_field: &str,
) -> HashMap<StudentCoreId, Vec<Submission>> {
    let by_numeric: HashMap<&str, &StudentCoreId> = students
        .iter()
        .filter_map(|student| {
            student
                .core_id
                .numeric_suffix()
                .map(|suffix| (suffix, &student.core_id))
        })
        .collect();

    let mut grouped: HashMap<StudentCoreId, Vec<Submission>> = HashMap::new();
    for submission in submissions {
        let Some(identity) = submission.answer_named(student_field) else {
            debug!(submission = %submission.id, "submission lacks the student-identifier answer");
            continue;
        };
        let numeric = identity.raw_value.trim();
        match by_numeric.get(numeric) {
            Some(core_id) => grouped
                .entry((*core_id).clone())
                .or_default()
                .push(submission),
            None => {
                debug!(
                    submission = %submission.id,
                    identifier = numeric,
                    "submission does not match any roster student"
                );
            }
        }
    }
    grouped
}

fn filter_to_roster(
    snapshot: ValidationSnapshot,
    students: &[Student],
) -> HashMap<StudentCoreId, ValidationRecord> {
    let mut validations = snapshot.validations;
    students
        .iter()
        .filter_map(|student| {
            validations
                .remove(&student.core_id)
                .map(|record| (student.core_id.clone(), record))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_core::model::{AnswerValue, SubmissionId};
    use survey_core::time::fixed_now;

    fn submission(id: &str, offset_secs: i64, answers: &[(&str, &str, &str)]) -> Submission {
        Submission {
            id: SubmissionId::from(id),
            created_at: fixed_now() + Duration::seconds(offset_secs),
            answers: answers
                .iter()
                .map(|(field, name, value)| {
                    ((*field).to_string(), AnswerValue::new(*name, *value))
                })
                .collect(),
        }
    }

    fn student(core_id: &str) -> Student {
        Student {
            core_id: StudentCoreId::from(core_id),
            student_id: format!("{core_id}-sid"),
            class_id: "7a".into(),
            school_id: "school-1".into(),
            gender: None,
        }
    }

    #[test]
    fn later_submission_wins_per_field() {
        let earlier = submission(
            "s-1",
            0,
            &[("q1", "token", "100"), ("q2", "ERV_1", "A")],
        );
        let later = submission("s-2", 60, &[("q1", "token", "100"), ("q2", "ERV_1", "B")]);

        let merged = merge_answers(&[earlier, later]);
        assert_eq!(merged["ERV_1"].raw_value, "B");
        assert_eq!(merged["token"].raw_value, "100");
    }

    #[test]
    fn fields_absent_from_later_submissions_survive() {
        let earlier = submission("s-1", 0, &[("q2", "ERV_1", "A"), ("q3", "ERV_2", "X")]);
        let later = submission("s-2", 60, &[("q2", "ERV_1", "B")]);

        let merged = merge_answers(&[earlier, later]);
        assert_eq!(merged["ERV_1"].raw_value, "B");
        assert_eq!(merged["ERV_2"].raw_value, "X");
    }

    #[test]
    fn grouping_matches_numeric_suffix() {
        let students = vec![student("C100"), student("C200")];
        let submissions = vec![
            submission("s-1", 0, &[("q1", "token", "100")]),
            submission("s-2", 1, &[("q1", "token", " 200 ")]),
            submission("s-3", 2, &[("q1", "token", "999")]),
            submission("s-4", 3, &[("q1", "other", "100")]),
        ];

        let grouped = group_by_student(&students, submissions, "token");
        assert_eq!(grouped[&StudentCoreId::from("C100")].len(), 1);
        assert_eq!(grouped[&StudentCoreId::from("C200")].len(), 1);
        assert_eq!(grouped.len(), 2);
    }
}
