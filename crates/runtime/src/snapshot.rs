//! Environment snapshot shared by successive hooks
//!
//! Each hook sources the snapshot before running and rewrites it with
//! `declare -p` afterwards, so variables exported by `start` are visible to
//! `reset`, `stop` and to `{{ env VAR }}` placeholders.

use crate::errors::HookError;
use crate::run_id::RunId;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Exit status the probe script uses for an unset variable.
const UNSET_STATUS: i32 = 3;

const PROBE_SCRIPT: &str = r#"source "$1" >/dev/null 2>&1 || true
if [ -z "${!2+x}" ]; then exit 3; fi
printf '%s' "${!2}""#;

/// Snapshot file owned by one run. Removed on drop.
#[derive(Debug)]
pub struct EnvSnapshot {
    run: RunId,
    path: PathBuf,
}

impl EnvSnapshot {
    /// Claim an empty snapshot file for `run`, moving to the next slot if
    /// another run got there first.
    pub fn create(run: RunId, state_dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(state_dir)?;
        let mut run = run;
        loop {
            let path = run.snapshot_path(state_dir);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    debug!(path = %path.display(), "created environment snapshot");
                    return Ok(Self { run, path });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    run = run.with_slot(run.slot + 1);
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value of `var` as the last hook left it. `None` when unset.
    pub async fn probe(&self, var: &str) -> Result<Option<String>, HookError> {
        probe(&self.path, var).await
    }
}

impl Drop for EnvSnapshot {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %err, "failed to remove environment snapshot");
            }
        }
    }
}

/// Read one variable out of the snapshot at `path` through bash.
pub async fn probe(path: &Path, var: &str) -> Result<Option<String>, HookError> {
    let failed = |reason: String| HookError::Probe {
        var: var.to_string(),
        reason,
    };

    if !is_variable_name(var) {
        return Err(failed("not a shell variable name".into()));
    }

    let child = Command::new("bash")
        .arg("-c")
        .arg(PROBE_SCRIPT)
        .arg("monkey")
        .arg(path)
        .arg(var)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| failed(err.to_string()))?;

    let output = tokio::time::timeout(PROBE_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| failed(format!("timed out after {}s", PROBE_TIMEOUT.as_secs())))?
        .map_err(|err| failed(err.to_string()))?;

    match output.status.code() {
        Some(0) => Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned())),
        Some(UNSET_STATUS) => Ok(None),
        _ => Err(failed(format!(
            "{}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ))),
    }
}

pub fn is_variable_name(var: &str) -> bool {
    let mut chars = var.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> RunId {
        RunId {
            dir_hash: "0123456789abcdef".into(),
            slot: 1,
        }
    }

    #[test]
    fn test_variable_names() {
        assert!(is_variable_name("API_PORT"));
        assert!(is_variable_name("_x1"));
        assert!(!is_variable_name(""));
        assert!(!is_variable_name("1PORT"));
        assert!(!is_variable_name("PORT; rm -rf /"));
    }

    #[test]
    fn test_create_claims_next_free_slot_and_cleans_up() {
        let state = tempfile::tempdir().unwrap();
        let first = EnvSnapshot::create(run(), state.path()).unwrap();
        let second = EnvSnapshot::create(run(), state.path()).unwrap();
        assert_eq!(first.run_id().slot, 1);
        assert_eq!(second.run_id().slot, 2);
        assert!(first.path().exists());

        let path = first.path().to_path_buf();
        drop(first);
        assert!(!path.exists());
        assert!(second.path().exists());
    }

    #[tokio::test]
    async fn test_probe_reads_declared_variables() {
        let state = tempfile::tempdir().unwrap();
        let snapshot = EnvSnapshot::create(run(), state.path()).unwrap();
        std::fs::write(
            snapshot.path(),
            "declare -x API_PORT=\"8123\"\ndeclare -- EMPTY=\"\"\n",
        )
        .unwrap();

        assert_eq!(snapshot.probe("API_PORT").await.unwrap().as_deref(), Some("8123"));
        assert_eq!(snapshot.probe("EMPTY").await.unwrap().as_deref(), Some(""));
        assert_eq!(snapshot.probe("MONKEY_SURELY_UNSET_VAR").await.unwrap(), None);
        assert!(matches!(
            snapshot.probe("bad name").await,
            Err(HookError::Probe { .. })
        ));
    }

    #[tokio::test]
    async fn test_probe_tolerates_empty_snapshot() {
        let state = tempfile::tempdir().unwrap();
        let snapshot = EnvSnapshot::create(run(), state.path()).unwrap();
        assert_eq!(snapshot.probe("MONKEY_SURELY_UNSET_VAR").await.unwrap(), None);
    }
}
