//! Campaign runtime: talks to the oracle and executes its commands against
//! the target service and the user's lifecycle hooks.

pub mod campaign;
pub mod config;
pub mod counters;
pub mod errors;
pub mod hooks;
pub mod oracle;
pub mod replay;
pub mod run_id;
pub mod snapshot;
pub mod template;

pub use campaign::{Campaign, CampaignReport, CampaignState, Verdict};
pub use config::{HooksConfig, OracleConfig, RunConfig};
pub use counters::{CampaignCounters, CountersSnapshot};
pub use errors::{CampaignError, ConfigError, HookError, OracleError, Result, TemplateError};
pub use hooks::{HookName, HookOutcome, Hooks, ShellHooks};
pub use oracle::{InitRequest, OracleClient};
pub use replay::{Replayed, Replayer, Target};
pub use run_id::RunId;
pub use snapshot::EnvSnapshot;
pub use template::Template;
