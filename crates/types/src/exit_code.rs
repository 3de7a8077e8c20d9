use std::fmt;

/// Process exit statuses surfaced to the invoking shell.
///
/// `2` is left free for argument-parsing usage errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitCode {
    Ok,
    Failed,
    FailedLint,
    /// Reserved for the self-updater, which lives outside this workspace.
    FailedUpdate,
    FoundBug,
    FailedExec,
    FailedSchema,
}

impl ExitCode {
    pub fn code(&self) -> u8 {
        match self {
            ExitCode::Ok => 0,
            ExitCode::Failed => 1,
            ExitCode::FailedLint => 3,
            ExitCode::FailedUpdate => 4,
            ExitCode::FoundBug => 6,
            ExitCode::FailedExec => 7,
            ExitCode::FailedSchema => 9,
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExitCode::Ok => "ok",
            ExitCode::Failed => "failed",
            ExitCode::FailedLint => "lint failed",
            ExitCode::FailedUpdate => "update failed",
            ExitCode::FoundBug => "found a bug",
            ExitCode::FailedExec => "lifecycle hook failed",
            ExitCode::FailedSchema => "payload does not validate",
        };
        write!(f, "{label} ({})", self.code())
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.code())
    }
}
