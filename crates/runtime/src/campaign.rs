//! The campaign loop: execute whatever the oracle asks until it says `done`

use crate::config::RunConfig;
use crate::counters::{spawn_progress_ticker, CampaignCounters, CountersSnapshot};
use crate::errors::{CampaignError, Result, TemplateError};
use crate::hooks::{HookName, Hooks};
use crate::oracle::{InitRequest, OracleClient};
use crate::replay::{Replayer, Target};
use crate::snapshot;
use crate::template::Template;
use monkey_types::{Command, CommandKind, ExitCode, Outcome, SpecIR};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    FoundBug,
    /// Every test passed but the `stop` hook failed.
    HookFailed,
}

impl Verdict {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Verdict::Passed => ExitCode::Ok,
            Verdict::FoundBug => ExitCode::FoundBug,
            Verdict::HookFailed => ExitCode::FailedExec,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Passed => "passed",
            Verdict::FoundBug => "found a bug",
            Verdict::HookFailed => "stop hook failed",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignState {
    Unauthenticated,
    Authenticated,
    Running,
    Terminated(Verdict),
}

#[derive(Debug, Clone)]
pub struct CampaignReport {
    pub verdict: Verdict,
    pub counters: CountersSnapshot,
    pub elapsed: Duration,
}

impl CampaignReport {
    pub fn exit_code(&self) -> ExitCode {
        self.verdict.exit_code()
    }
}

/// Drives one campaign. Executes one command at a time.
pub struct Campaign<H: Hooks> {
    spec: SpecIR,
    config: RunConfig,
    oracle: OracleClient,
    hooks: H,
    replayer: Replayer,
    snapshot: PathBuf,
    counters: Arc<CampaignCounters>,
    state: CampaignState,
}

impl<H: Hooks> Campaign<H> {
    pub fn new(
        spec: SpecIR,
        config: &RunConfig,
        oracle: OracleClient,
        hooks: H,
        snapshot: impl Into<PathBuf>,
    ) -> Result<Self> {
        let replayer = Replayer::new(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self {
            spec,
            config: config.clone(),
            oracle,
            hooks,
            replayer,
            snapshot: snapshot.into(),
            counters: Arc::new(CampaignCounters::new()),
            state: CampaignState::Unauthenticated,
        })
    }

    pub fn counters(&self) -> Arc<CampaignCounters> {
        Arc::clone(&self.counters)
    }

    pub fn state(&self) -> CampaignState {
        self.state
    }

    pub async fn run(&mut self) -> Result<CampaignReport> {
        let started = Instant::now();

        self.oracle.authenticate(self.config.tests).await?;
        self.state = CampaignState::Authenticated;
        info!(tests = self.config.tests, oracle = %self.oracle.base_url(), "authenticated with oracle");

        let start = self.hooks.run(HookName::Start).await;
        if let Some(err) = start.error {
            return Err(CampaignError::Hook(err));
        }
        let target = self.freeze_target().await?;

        let ticker = spawn_progress_ticker(self.counters(), PROGRESS_INTERVAL);
        let result = self.drive(target).await;
        ticker.abort();
        let mut verdict = result?;

        let stop = self.hooks.run(HookName::Stop).await;
        if let Some(reason) = stop.failure_reason() {
            warn!(%reason, "stop hook failed");
            if verdict == Verdict::Passed {
                verdict = Verdict::HookFailed;
            }
        }

        self.state = CampaignState::Terminated(verdict);
        let report = CampaignReport {
            verdict,
            counters: self.counters.snapshot(),
            elapsed: started.elapsed(),
        };
        info!(
            %verdict,
            requests = report.counters.total_requests,
            tests = report.counters.tests_seen,
            elapsed_secs = report.elapsed.as_secs(),
            "campaign finished"
        );
        Ok(report)
    }

    async fn drive(&mut self, mut target: Target) -> Result<Verdict> {
        let init = InitRequest::new(&self.spec, &self.config);
        let mut command = self.oracle.init(&init).await?;
        self.state = CampaignState::Running;
        info!(endpoints = self.spec.endpoints.len(), "campaign started");

        loop {
            debug!(command = %command.kind(), "executing");
            let outcome = match command {
                Command::Done(done) => {
                    return Ok(if done.failure {
                        Verdict::FoundBug
                    } else {
                        Verdict::Passed
                    });
                }
                Command::Req(req) => {
                    self.counters.record_request(req.lane);
                    let replayed = self.replayer.replay(&req.request, &target).await;
                    Outcome::request(req.lane, replayed.elapsed_micros, replayed.result)
                }
                Command::Reset => self.run_hook(HookName::Reset, &mut target).await,
                Command::Start => self.run_hook(HookName::Start, &mut target).await,
                Command::Stop => self.run_hook(HookName::Stop, &mut target).await,
            };
            command = self.oracle.next(&outcome).await?;
        }
    }

    /// Run a hook on the oracle's behalf. `reset` re-freezes the target
    /// when it succeeds; a target that no longer resolves is reported as the
    /// hook's failure and the previous target is kept.
    async fn run_hook(&self, hook: HookName, target: &mut Target) -> Outcome {
        let outcome = self.hooks.run(hook).await;
        let mut failure = outcome.failure_reason();

        if hook == HookName::Reset && failure.is_none() {
            match self.freeze_target().await {
                Ok(frozen) => *target = frozen,
                Err(err) => {
                    warn!(error = %err, "target no longer resolves after reset");
                    failure = Some(err.to_string());
                }
            }
        }
        Outcome::hook(CommandKind::from(hook), outcome.elapsed_micros, failure)
    }

    async fn freeze_target(&self) -> std::result::Result<Target, TemplateError> {
        let host = Template::parse(&self.config.host)?;
        let port = Template::parse(&self.config.port)?;

        let mut values: HashMap<String, String> = HashMap::new();
        for var in host.vars().into_iter().chain(port.vars()) {
            if values.contains_key(var) {
                continue;
            }
            if let Some(value) = snapshot::probe(&self.snapshot, var).await? {
                values.insert(var.to_string(), value);
            }
        }

        let host = host.render(&values)?;
        let port = port.render(&values)?;
        let port = port
            .trim()
            .parse()
            .map_err(|_| TemplateError::InvalidPort(port.clone()))?;
        let target = Target { host, port };
        info!(%target, "target frozen");
        Ok(target)
    }
}
