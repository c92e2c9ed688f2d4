use thiserror::Error;

use crate::model::student::GenderParseError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Gender(#[from] GenderParseError),
}
