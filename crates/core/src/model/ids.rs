use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned to a submission by the remote survey API.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(String);

/// Join key linking two independently sourced response records for the
/// same assessment attempt.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

/// Identifier of one logical assessment task.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

/// Identifier of a named group of logical tasks.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SetId(String);

/// Roster-wide student identifier, e.g. `"C100"`.
///
/// The trailing digit run is what submissions carry in their
/// student-identifier answer, so matching strips the prefix.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentCoreId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }
    };
}

string_id!(SubmissionId);
string_id!(SessionKey);
string_id!(TaskId);
string_id!(SetId);
string_id!(StudentCoreId);

impl StudentCoreId {
    /// The trailing digit run of the id, if any ("C100" → "100").
    #[must_use]
    pub fn numeric_suffix(&self) -> Option<&str> {
        let trimmed = self.0.trim();
        // Walk by char so a multi-byte prefix character does not throw
        // the slice off a char boundary.
        let start = trimmed
            .char_indices()
            .rfind(|(_, c)| !c.is_ascii_digit())
            .map_or(0, |(idx, c)| idx + c.len_utf8());
        let suffix = &trimmed[start..];
        if suffix.is_empty() { None } else { Some(suffix) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_suffix_strips_prefix() {
        assert_eq!(StudentCoreId::from("C100").numeric_suffix(), Some("100"));
        assert_eq!(StudentCoreId::from("AB007").numeric_suffix(), Some("007"));
    }

    #[test]
    fn numeric_suffix_of_plain_number_is_identity() {
        assert_eq!(StudentCoreId::from("42").numeric_suffix(), Some("42"));
    }

    #[test]
    fn numeric_suffix_missing_digits() {
        assert_eq!(StudentCoreId::from("XYZ").numeric_suffix(), None);
        assert_eq!(StudentCoreId::from("").numeric_suffix(), None);
    }

    #[test]
    fn numeric_suffix_ignores_embedded_digits() {
        // Only the trailing run counts.
        assert_eq!(StudentCoreId::from("C1B22").numeric_suffix(), Some("22"));
    }

    #[test]
    fn numeric_suffix_handles_multibyte_prefix() {
        assert_eq!(StudentCoreId::from("学100").numeric_suffix(), Some("100"));
        assert_eq!(StudentCoreId::from("Ø7").numeric_suffix(), Some("7"));
        assert_eq!(StudentCoreId::from("学校").numeric_suffix(), None);
    }

    #[test]
    fn display_round_trip() {
        let id = SessionKey::new("S1");
        assert_eq!(id.to_string(), "S1");
        assert_eq!(id.as_str(), "S1");
    }
}
