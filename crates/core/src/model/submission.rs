use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::SubmissionId;

/// One answer as stored by the survey engine: the semantic field name
/// plus the raw value string, both untouched by this pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerValue {
    pub name: String,
    pub raw_value: String,
}

impl AnswerValue {
    #[must_use]
    pub fn new(name: impl Into<String>, raw_value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_value: raw_value.into(),
        }
    }

    /// True when the raw value is empty after trimming.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.raw_value.trim().is_empty()
    }
}

/// Immutable record fetched from the remote survey API. `answers` is
/// keyed by the engine's field id; the semantic field name lives on the
/// value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub created_at: DateTime<Utc>,
    pub answers: BTreeMap<String, AnswerValue>,
}

impl Submission {
    /// Looks up an answer by its semantic field name.
    #[must_use]
    pub fn answer_named(&self, name: &str) -> Option<&AnswerValue> {
        self.answers.values().find(|answer| answer.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn build_submission() -> Submission {
        let mut answers = BTreeMap::new();
        answers.insert("q1".into(), AnswerValue::new("token", "100"));
        answers.insert("q2".into(), AnswerValue::new("ERV_1", "  "));
        Submission {
            id: SubmissionId::from("s-1"),
            created_at: fixed_now(),
            answers,
        }
    }

    #[test]
    fn answer_named_finds_by_semantic_name() {
        let submission = build_submission();
        let answer = submission.answer_named("token").unwrap();
        assert_eq!(answer.raw_value, "100");
        assert!(submission.answer_named("missing").is_none());
    }

    #[test]
    fn blank_detection_trims() {
        let submission = build_submission();
        assert!(submission.answer_named("ERV_1").unwrap().is_blank());
        assert!(!submission.answer_named("token").unwrap().is_blank());
    }
}
