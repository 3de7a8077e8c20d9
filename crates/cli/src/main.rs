//! `monkey`: compile an API description, validate payloads against it, and
//! run fuzzing campaigns driven by the remote oracle.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use monkey_compiler::{compile_str, lint};
use monkey_runtime::{
    Campaign, EnvSnapshot, HookName, Hooks, OracleClient, RunConfig, RunId, ShellHooks,
};
use monkey_types::{ExitCode, SpecIR};
use monkey_validator::{SchemaValidator, ValidatorError};
use serde_json::Value;
use std::fs::File;
use std::future::Future;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "monkey")]
#[command(about = "Contract fuzzing for HTTP APIs", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: monkey.{toml,yaml,json} if present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the API description and report problems
    Lint {
        /// OpenAPI document (default: `spec` from the configuration)
        spec: Option<PathBuf>,
    },
    /// Run a fuzzing campaign against the configured target
    Fuzz {
        /// Number of tests to plan
        #[arg(long)]
        tests: Option<u32>,
    },
    /// Validate a JSON payload against a schema of the API description
    Schema {
        /// Schema reference, e.g. `#/components/schemas/Pet`, `Pet` or a sid
        #[arg(long, value_name = "REF")]
        validate_against: String,
        /// Payload file, `-` for stdin
        #[arg(default_value = "-", value_name = "FILE")]
        payload: String,
    },
    /// Run one lifecycle hook
    Exec {
        #[arg(value_enum)]
        hook: HookArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum HookArg {
    Start,
    Reset,
    Stop,
}

impl From<HookArg> for HookName {
    fn from(hook: HookArg) -> Self {
        match hook {
            HookArg::Start => HookName::Start,
            HookArg::Reset => HookName::Reset,
            HookArg::Stop => HookName::Stop,
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let config = match RunConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::Failed.into();
        }
    };

    let result = match cli.command {
        Commands::Lint { spec } => lint_command(&config, spec.as_deref()),
        Commands::Fuzz { tests } => fuzz_command(config, tests).await,
        Commands::Schema {
            validate_against,
            payload,
        } => schema_command(&config, &validate_against, &payload),
        Commands::Exec { hook } => exec_command(&config, hook.into()).await,
    };

    match result {
        Ok(code) => code.into(),
        Err(err) => {
            error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::Failed.into()
        }
    }
}

/// Warnings and errors go to stderr. With a log file, everything the filter
/// admits (`RUST_LOG`, else `log_level`) is also written there.
fn init_logging(config: &RunConfig, log_file: Option<&Path>) -> Result<()> {
    let stderr = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(LevelFilter::WARN);

    let file = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry().with(file).with(stderr).init();
    Ok(())
}

fn read_spec(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read API description {}", path.display()))
}

fn lint_command(config: &RunConfig, spec: Option<&Path>) -> Result<ExitCode> {
    init_logging(config, None)?;
    let path = spec.unwrap_or(config.spec.as_path());

    let text = match read_spec(path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("{err:#}");
            return Ok(ExitCode::FailedLint);
        }
    };
    match lint(&text) {
        Ok(report) => {
            println!("{}: {report}", path.display());
            Ok(ExitCode::Ok)
        }
        Err(err) => {
            eprintln!("{}: {err}", path.display());
            Ok(ExitCode::FailedLint)
        }
    }
}

fn compile_spec(path: &Path) -> Result<SpecIR> {
    let text = read_spec(path)?;
    compile_str(&text).with_context(|| format!("failed to compile {}", path.display()))
}

fn schema_command(config: &RunConfig, reference: &str, payload: &str) -> Result<ExitCode> {
    init_logging(config, None)?;
    let spec = compile_spec(&config.spec)?;

    let mut text = String::new();
    if payload == "-" {
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read payload from stdin")?;
    } else {
        text = std::fs::read_to_string(payload)
            .with_context(|| format!("failed to read payload {payload}"))?;
    }
    let value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("payload is not JSON: {err}");
            return Ok(ExitCode::FailedSchema);
        }
    };

    let validator = SchemaValidator::new(&spec.schemas);
    match validator.validate_ref(reference, &value) {
        Ok(issues) if issues.is_empty() => Ok(ExitCode::Ok),
        Ok(issues) => {
            for issue in &issues {
                println!("{issue}");
            }
            Ok(ExitCode::FailedSchema)
        }
        Err(err @ ValidatorError::NoSuchRef(_)) => {
            eprintln!("{err}");
            Ok(ExitCode::FailedSchema)
        }
        Err(err) => Err(err.into()),
    }
}

/// Registers SIGTERM and SIGINT handlers right away. The future resolves
/// with the name of the first signal received.
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    let mut sigterm = signal(SignalKind::terminate()).context("failed to register SIGTERM")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to register SIGINT")?;
    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Drives `work` until it completes or `shutdown` fires. On shutdown `work`
/// is dropped, releasing the hooks and snapshot it owns, and `None` is
/// returned.
async fn until_shutdown<F: Future>(
    work: F,
    shutdown: impl Future<Output = &'static str>,
) -> Option<F::Output> {
    tokio::select! {
        output = work => Some(output),
        signal = shutdown => {
            warn!(signal, "interrupted");
            None
        }
    }
}

/// Claim this run's snapshot and start logging to its log file.
fn start_run(config: &RunConfig) -> Result<EnvSnapshot> {
    let state_dir = config.state_dir();
    let run = RunId::for_current_dir(&state_dir).context("failed to identify run")?;
    let snapshot = EnvSnapshot::create(run, &state_dir).with_context(|| {
        format!("failed to create environment snapshot in {}", state_dir.display())
    })?;
    let log_path = snapshot.run_id().log_path(&state_dir);
    init_logging(config, Some(&log_path))?;
    info!(
        snapshot = %snapshot.path().display(),
        log = %log_path.display(),
        "run started"
    );
    Ok(snapshot)
}

fn shell_hooks(config: &RunConfig, snapshot: &EnvSnapshot) -> ShellHooks {
    ShellHooks::new(config.hooks.clone(), snapshot.path())
        .with_timeout(Duration::from_secs(config.hook_timeout_secs))
}

async fn fuzz_command(mut config: RunConfig, tests: Option<u32>) -> Result<ExitCode> {
    if let Some(tests) = tests {
        config.tests = tests;
    }
    let (url, api_key) = config.oracle_credentials()?;
    let oracle = OracleClient::new(url, api_key)?;

    let shutdown = shutdown_signal()?;
    let snapshot = start_run(&config)?;
    let spec = compile_spec(&config.spec)?;
    let hooks = shell_hooks(&config, &snapshot);
    let mut campaign = Campaign::new(spec, &config, oracle, hooks, snapshot.path())?;

    let code = match until_shutdown(campaign.run(), shutdown).await {
        Some(Ok(report)) => {
            println!(
                "{}: {} requests over {} tests in {:.1}s",
                report.verdict,
                report.counters.total_requests,
                report.counters.tests_seen,
                report.elapsed.as_secs_f64()
            );
            report.exit_code()
        }
        Some(Err(err)) => {
            error!(error = %err, "campaign aborted");
            eprintln!("error: {err}");
            err.exit_code()
        }
        None => ExitCode::Failed,
    };

    // Removes the snapshot file, including after a signal.
    drop(campaign);
    drop(snapshot);
    Ok(code)
}

async fn exec_command(config: &RunConfig, hook: HookName) -> Result<ExitCode> {
    let shutdown = shutdown_signal()?;
    let snapshot = start_run(config)?;
    let hooks = shell_hooks(config, &snapshot);
    let Some(outcome) = until_shutdown(hooks.run(hook), shutdown).await else {
        return Ok(ExitCode::Failed);
    };

    match outcome.failure_reason() {
        None => {
            info!(%hook, elapsed_micros = outcome.elapsed_micros, "hook succeeded");
            Ok(ExitCode::Ok)
        }
        Some(reason) => {
            eprintln!("{reason}");
            Ok(ExitCode::FailedExec)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_schema_payload_defaults_to_stdin() {
        let cli = Cli::try_parse_from(["monkey", "schema", "--validate-against", "Pet"]).unwrap();
        match cli.command {
            Commands::Schema {
                validate_against,
                payload,
            } => {
                assert_eq!(validate_against, "Pet");
                assert_eq!(payload, "-");
            }
            _ => panic!("expected schema command"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli =
            Cli::try_parse_from(["monkey", "fuzz", "--tests", "25", "--config", "ci.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("ci.toml")));
        assert!(matches!(cli.command, Commands::Fuzz { tests: Some(25) }));
    }

    #[tokio::test]
    async fn test_sigterm_drops_work_and_removes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let run = RunId::for_dir(dir.path(), dir.path()).unwrap();
        let snapshot = EnvSnapshot::create(run, dir.path()).unwrap();
        let path = snapshot.path().to_path_buf();
        assert!(path.exists());

        let shutdown = shutdown_signal().unwrap();
        let work = async move {
            let _snapshot = snapshot;
            std::future::pending::<()>().await
        };
        tokio::spawn(async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tokio::process::Command::new("kill")
                .args(["-TERM", &std::process::id().to_string()])
                .status()
                .await
                .unwrap();
        });

        let finished = tokio::time::timeout(Duration::from_secs(10), until_shutdown(work, shutdown))
            .await
            .unwrap();
        assert!(finished.is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_finished_work_is_returned() {
        let shutdown = std::future::pending::<&'static str>();
        assert_eq!(until_shutdown(async { 7 }, shutdown).await, Some(7));
    }

    #[test]
    fn test_exec_rejects_unknown_hooks() {
        assert!(Cli::try_parse_from(["monkey", "exec", "teardown"]).is_err());
        let cli = Cli::try_parse_from(["monkey", "exec", "reset"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Exec {
                hook: HookArg::Reset
            }
        ));
    }
}
