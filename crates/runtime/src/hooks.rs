//! Lifecycle hooks: user shell snippets run around the campaign

use crate::config::HooksConfig;
use crate::errors::HookError;
use async_trait::async_trait;
use monkey_types::CommandKind;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, Command};
use tracing::{debug, info, warn};

pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(180);

/// How long stderr is drained after the shell exits. Processes started in
/// the background inherit the pipe, so EOF may never come.
const STDERR_GRACE: Duration = Duration::from_millis(200);

/// Only the tail of a hook's stderr is kept for the failure report.
const STDERR_TAIL: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookName {
    Start,
    Reset,
    Stop,
}

impl HookName {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookName::Start => "start",
            HookName::Reset => "reset",
            HookName::Stop => "stop",
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HookName> for CommandKind {
    fn from(hook: HookName) -> Self {
        match hook {
            HookName::Start => CommandKind::Start,
            HookName::Reset => CommandKind::Reset,
            HookName::Stop => CommandKind::Stop,
        }
    }
}

#[derive(Debug)]
pub struct HookOutcome {
    pub hook: HookName,
    pub elapsed_micros: u64,
    pub error: Option<HookError>,
}

impl HookOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn failure_reason(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// Runs lifecycle hooks. Failures are reported in the outcome, never raised.
#[async_trait]
pub trait Hooks: Send + Sync {
    async fn run(&self, hook: HookName) -> HookOutcome;
}

/// Runs hooks through `bash`, carrying variables between hooks in the
/// environment snapshot file.
#[derive(Debug, Clone)]
pub struct ShellHooks {
    commands: HooksConfig,
    snapshot: PathBuf,
    timeout: Duration,
}

impl ShellHooks {
    pub fn new(commands: HooksConfig, snapshot: impl Into<PathBuf>) -> Self {
        Self {
            commands,
            snapshot: snapshot.into(),
            timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn snapshot(&self) -> &Path {
        &self.snapshot
    }

    async fn execute(&self, hook: HookName, commands: &[String]) -> Result<(), HookError> {
        let script = script(&self.snapshot, commands);
        debug!(%hook, commands = commands.len(), "running hook");

        let mut child = Command::new("bash")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| HookError::Spawn { hook, source })?;

        let captured = Arc::new(Mutex::new(Vec::new()));
        let drain = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(drain_stderr(stderr, Arc::clone(&captured))));

        // Dropping the child on timeout kills it.
        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status.map_err(|source| HookError::Spawn { hook, source })?,
            Err(_) => {
                return Err(HookError::Timeout {
                    hook,
                    after: self.timeout,
                })
            }
        };
        if status.success() {
            return Ok(());
        }

        // A timed out drain keeps running detached, so a background process
        // never writes into a closed pipe.
        if let Some(drain) = drain {
            let _ = tokio::time::timeout(STDERR_GRACE, drain).await;
        }
        let stderr = String::from_utf8_lossy(&captured.lock()).trim().to_string();
        Err(HookError::Failed {
            hook,
            status: status.to_string(),
            stderr,
        })
    }
}

async fn drain_stderr(mut stderr: ChildStderr, captured: Arc<Mutex<Vec<u8>>>) {
    let mut chunk = [0u8; 4096];
    loop {
        match stderr.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(read) => {
                let mut captured = captured.lock();
                captured.extend_from_slice(&chunk[..read]);
                if captured.len() > STDERR_TAIL {
                    let excess = captured.len() - STDERR_TAIL;
                    captured.drain(..excess);
                }
            }
        }
    }
}

#[async_trait]
impl Hooks for ShellHooks {
    async fn run(&self, hook: HookName) -> HookOutcome {
        let commands = self.commands.commands(hook);
        if commands.is_empty() {
            return HookOutcome {
                hook,
                elapsed_micros: 0,
                error: None,
            };
        }

        let started = Instant::now();
        let result = self.execute(hook, commands).await;
        let elapsed_micros = started.elapsed().as_micros() as u64;

        match &result {
            Ok(()) => info!(%hook, elapsed_micros, "hook finished"),
            Err(err) => warn!(%hook, elapsed_micros, error = %err, "hook failed"),
        }
        HookOutcome {
            hook,
            elapsed_micros,
            error: result.err(),
        }
    }
}

fn script(snapshot: &Path, commands: &[String]) -> String {
    let snapshot = shell_quote(&snapshot.to_string_lossy());
    let mut script = format!("source {snapshot} >/dev/null 2>&1 || true\n");
    script.push_str("set -o errexit -o errtrace -o nounset -o pipefail -o xtrace\n");
    for command in commands {
        script.push_str(command);
        script.push('\n');
    }
    script.push_str("set +o xtrace +o nounset\n");
    script.push_str(&format!("declare -p > {snapshot}\n"));
    script
}

fn shell_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot;

    fn hooks(dir: &Path, commands: HooksConfig) -> ShellHooks {
        let snapshot = dir.join("run.env");
        std::fs::write(&snapshot, "").unwrap();
        ShellHooks::new(commands, snapshot)
    }

    #[test]
    fn test_script_layout() {
        let script = script(
            Path::new("/tmp/it's.env"),
            &["export A=1".to_string(), "echo $A".to_string()],
        );
        assert_eq!(
            script,
            "source '/tmp/it'\\''s.env' >/dev/null 2>&1 || true\n\
             set -o errexit -o errtrace -o nounset -o pipefail -o xtrace\n\
             export A=1\n\
             echo $A\n\
             set +o xtrace +o nounset\n\
             declare -p > '/tmp/it'\\''s.env'\n"
        );
    }

    #[tokio::test]
    async fn test_no_commands_is_instant_success() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = hooks(dir.path(), HooksConfig::default())
            .run(HookName::Reset)
            .await;
        assert!(outcome.is_success());
        assert_eq!(outcome.elapsed_micros, 0);
    }

    #[tokio::test]
    async fn test_exports_survive_between_hooks() {
        let dir = tempfile::tempdir().unwrap();
        let hooks = hooks(
            dir.path(),
            HooksConfig {
                start: vec!["export API_PORT=4321".into()],
                reset: vec![r#"test "$API_PORT" = 4321"#.into()],
                stop: vec![],
            },
        );

        let start = hooks.run(HookName::Start).await;
        assert!(start.is_success(), "{:?}", start.failure_reason());
        let reset = hooks.run(HookName::Reset).await;
        assert!(reset.is_success(), "{:?}", reset.failure_reason());

        let port = snapshot::probe(hooks.snapshot(), "API_PORT").await.unwrap();
        assert_eq!(port.as_deref(), Some("4321"));
    }

    #[tokio::test]
    async fn test_failure_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let hooks = hooks(
            dir.path(),
            HooksConfig {
                start: vec!["echo database unreachable >&2".into(), "false".into(), "echo never".into()],
                ..HooksConfig::default()
            },
        );

        let outcome = hooks.run(HookName::Start).await;
        match outcome.error {
            Some(HookError::Failed { hook, stderr, .. }) => {
                assert_eq!(hook, HookName::Start);
                assert!(stderr.contains("database unreachable"), "{stderr}");
                assert!(!stderr.contains("+ echo never"), "{stderr}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unset_variables_fail_the_hook() {
        let dir = tempfile::tempdir().unwrap();
        let hooks = hooks(
            dir.path(),
            HooksConfig {
                stop: vec!["echo $MONKEY_SURELY_UNSET_VAR".into()],
                ..HooksConfig::default()
            },
        );
        let outcome = hooks.run(HookName::Stop).await;
        assert!(matches!(outcome.error, Some(HookError::Failed { .. })));
    }

    #[tokio::test]
    async fn test_background_process_does_not_hold_the_hook() {
        let dir = tempfile::tempdir().unwrap();
        let hooks = hooks(
            dir.path(),
            HooksConfig {
                start: vec!["sleep 6 &".into(), "export PORT=8080".into()],
                ..HooksConfig::default()
            },
        )
        .with_timeout(Duration::from_secs(3));

        let started = Instant::now();
        let outcome = hooks.run(HookName::Start).await;
        assert!(outcome.is_success(), "{:?}", outcome.failure_reason());
        assert!(started.elapsed() < Duration::from_secs(2));

        let port = snapshot::probe(hooks.snapshot(), "PORT").await.unwrap();
        assert_eq!(port.as_deref(), Some("8080"));
    }

    #[tokio::test]
    async fn test_failure_after_background_process_still_reports() {
        let dir = tempfile::tempdir().unwrap();
        let hooks = hooks(
            dir.path(),
            HooksConfig {
                start: vec![
                    "sleep 6 &".into(),
                    "echo migration failed >&2".into(),
                    "exit 4".into(),
                ],
                ..HooksConfig::default()
            },
        )
        .with_timeout(Duration::from_secs(3));

        let started = Instant::now();
        let outcome = hooks.run(HookName::Start).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        match outcome.error {
            Some(HookError::Failed { stderr, .. }) => {
                assert!(stderr.contains("migration failed"), "{stderr}")
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_the_hook() {
        let dir = tempfile::tempdir().unwrap();
        let hooks = hooks(
            dir.path(),
            HooksConfig {
                reset: vec!["sleep 30".into()],
                ..HooksConfig::default()
            },
        )
        .with_timeout(Duration::from_millis(200));

        let outcome = hooks.run(HookName::Reset).await;
        assert!(matches!(
            outcome.error,
            Some(HookError::Timeout { hook: HookName::Reset, .. })
        ));
        assert!(outcome.elapsed_micros < 10_000_000);
    }
}
