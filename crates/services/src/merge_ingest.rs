//! Adapts cross-source merge output into canonical submissions so the
//! merged dataset can back the submission snapshot.

use chrono::{DateTime, NaiveDateTime, Utc};

use survey_core::merge::MergedRecord;
use survey_core::model::{AnswerValue, Submission, SubmissionId};

/// Field carrying the response timestamp in merged records.
const SUBMIT_DATE_FIELD: &str = "submitdate";

/// Converts merged records into submissions: the session key becomes
/// the submission id, every field becomes an answer, and `created_at`
/// comes from the record's submit-date field when parseable, otherwise
/// from `fallback`.
#[must_use]
pub fn merged_to_submissions(
    records: &[MergedRecord],
    fallback: DateTime<Utc>,
) -> Vec<Submission> {
    records
        .iter()
        .map(|record| {
            let created_at = record
                .fields
                .get(SUBMIT_DATE_FIELD)
                .and_then(|raw| parse_timestamp(raw))
                .unwrap_or(fallback);
            let answers = record
                .fields
                .iter()
                .map(|(field, value)| {
                    (field.clone(), AnswerValue::new(field.clone(), value.clone()))
                })
                .collect();
            Submission {
                id: SubmissionId::new(record.session_key.as_str()),
                created_at,
                answers,
            }
        })
        .collect()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
