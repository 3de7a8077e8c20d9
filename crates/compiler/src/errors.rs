use monkey_types::{InvalidStatusCode, UnsupportedMethod};
use thiserror::Error;

/// Anything that stops a document from becoming a Spec IR.
///
/// Every variant is fatal: compilation happens before any network or process
/// activity and is never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("malformed API description: {0}")]
    Malformed(String),

    #[error("unsupported API description version {0:?} (expected 3.0.x)")]
    UnsupportedVersion(String),

    #[error("invalid server url {url:?}: {reason}")]
    InvalidServerUrl { url: String, reason: String },

    #[error("{path}: {source}")]
    UnsupportedMethod {
        path: String,
        #[source]
        source: UnsupportedMethod,
    },

    #[error("{endpoint}: {source}")]
    BadStatusCode {
        endpoint: String,
        #[source]
        source: InvalidStatusCode,
    },

    #[error("bad path template {path:?}: {reason}")]
    BadPathTemplate { path: String, reason: String },

    #[error("path {path:?} uses {{{name}}} but declares no such path parameter")]
    UnknownPathParam { path: String, name: String },

    #[error("unresolved reference {0:?}")]
    UnresolvedRef(String),
}

pub type Result<T> = std::result::Result<T, CompileError>;
