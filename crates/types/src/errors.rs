//! Error types for decoding wire-level values

use thiserror::Error;

/// A response status key that is neither `default`, an `NXX` range, nor a
/// literal code in `100..=599`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported response status code: {0:?}")]
pub struct InvalidStatusCode(pub String);

/// An HTTP method outside of the set an endpoint can carry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported HTTP method: {0:?}")]
pub struct UnsupportedMethod(pub String);

/// Failure to turn oracle bytes into a [`crate::Command`].
#[derive(Error, Debug)]
pub enum CommandDecodeError {
    #[error("command is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("command has no string `cmd` field")]
    MissingTag,

    #[error("unknown command {0:?}")]
    UnknownTag(String),

    #[error("command {0:?} is issued by the driver only and cannot come from the oracle")]
    DriverOnly(String),
}
