use crate::hooks::HookName;
use monkey_types::{CommandDecodeError, ExitCode};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("configuration file {} not found", .0.display())]
    MissingFile(PathBuf),

    #[error("missing required setting `{0}`")]
    Missing(&'static str),
}

/// Why a lifecycle hook did not complete.
#[derive(Error, Debug)]
pub enum HookError {
    #[error("could not start shell for `{hook}` hook: {source}")]
    Spawn {
        hook: HookName,
        #[source]
        source: std::io::Error,
    },

    #[error("`{hook}` hook timed out after {after:?}")]
    Timeout { hook: HookName, after: Duration },

    #[error("`{hook}` hook failed ({status}): {stderr}")]
    Failed {
        hook: HookName,
        status: String,
        stderr: String,
    },

    #[error("environment probe for {var} failed: {reason}")]
    Probe { var: String, reason: String },
}

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("unterminated placeholder in {0:?}")]
    Unterminated(String),

    #[error("unsupported placeholder {{{{ {0} }}}}")]
    Unsupported(String),

    #[error("environment variable {0} is not set in the run environment")]
    Unset(String),

    #[error("port {0:?} is not a valid TCP port")]
    InvalidPort(String),

    #[error(transparent)]
    Probe(#[from] HookError),
}

/// Talking to the oracle. Always fatal, never retried.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("invalid oracle URL: {0}")]
    InvalidBaseUrl(String),

    #[error("url error: {0}")]
    Url(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{call} answered {status}, expected {expected}: {body}")]
    UnexpectedStatus {
        call: &'static str,
        status: u16,
        expected: u16,
        body: String,
    },

    #[error("{0} response carried no auth token")]
    MissingToken(&'static str),

    #[error("undecodable command from oracle: {0}")]
    Decode(#[from] CommandDecodeError),

    #[error("no auth token, authenticate first")]
    Unauthenticated,
}

#[derive(Error, Debug)]
pub enum CampaignError {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("start hook failed: {0}")]
    Hook(#[source] HookError),

    #[error("could not resolve target: {0}")]
    Target(#[from] TemplateError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl CampaignError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CampaignError::Hook(_) => ExitCode::FailedExec,
            _ => ExitCode::Failed,
        }
    }
}

pub type Result<T> = std::result::Result<T, CampaignError>;
