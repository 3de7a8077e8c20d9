use monkey_types::Sid;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidatorError {
    /// The reference names no entry of the table. Distinct from a payload
    /// that fails validation.
    #[error("no such schema reference: {0}")]
    NoSuchRef(String),

    #[error("schema {sid} could not be compiled: {message}")]
    InvalidSchema { sid: Sid, message: String },
}

pub type Result<T> = std::result::Result<T, ValidatorError>;
