use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::ids::StudentCoreId;

/// Roster entry, read-only from the pipeline's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub core_id: StudentCoreId,
    pub student_id: String,
    pub class_id: String,
    pub school_id: String,
    pub gender: Option<Gender>,
}

/// Student gender as recorded on the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized gender token: {token:?}")]
pub struct GenderParseError {
    pub token: String,
}

impl Gender {
    /// Lenient parse accepting short forms, any case, surrounding
    /// whitespace. Returns `None` for unrecognized tokens instead of an
    /// error; callers treating unknown gender as "check all variants"
    /// want an `Option`, not a failure.
    #[must_use]
    pub fn normalize(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Some(Gender::Male),
            "f" | "female" => Some(Gender::Female),
            _ => None,
        }
    }
}

impl FromStr for Gender {
    type Err = GenderParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gender::normalize(s).ok_or_else(|| GenderParseError {
            token: s.to_owned(),
        })
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}
