//! Run configuration
//!
//! Layered with the `config` crate: an optional file (`monkey.toml`,
//! `monkey.yaml` or `monkey.json` in the working directory, or an explicit
//! `--config` path) overridden by `MONKEY_`-prefixed environment variables,
//! e.g. `MONKEY_ORACLE__API_KEY`.

use crate::errors::ConfigError;
use crate::hooks::HookName;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "MONKEY";
pub const DEFAULT_FILE_STEM: &str = "monkey";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// OpenAPI document to compile.
    pub spec: PathBuf,
    /// Target host, may contain `{{ env VAR }}`.
    pub host: String,
    /// Target port, may contain `{{ env VAR }}`.
    pub port: String,
    /// Number of tests the oracle should plan.
    pub tests: u32,
    pub hooks: HooksConfig,
    pub oracle: OracleConfig,
    pub request_timeout_secs: u64,
    pub hook_timeout_secs: u64,
    pub log_level: String,
    /// Where run snapshots and logs go. System temp dir when unset.
    pub state_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            spec: PathBuf::from("openapi.json"),
            host: "localhost".to_string(),
            port: "3000".to_string(),
            tests: 10,
            hooks: HooksConfig::default(),
            oracle: OracleConfig::default(),
            request_timeout_secs: 10,
            hook_timeout_secs: 180,
            log_level: "info".to_string(),
            state_dir: None,
        }
    }
}

/// Shell snippets per lifecycle hook, run in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    pub start: Vec<String>,
    pub reset: Vec<String>,
    pub stop: Vec<String>,
}

impl HooksConfig {
    pub fn commands(&self, hook: HookName) -> &[String] {
        match hook {
            HookName::Start => &self.start,
            HookName::Reset => &self.reset,
            HookName::Stop => &self.stop,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub url: Option<String>,
    /// Never serialized, so it cannot leak into what the oracle receives.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl RunConfig {
    /// Load from `path`, or from `monkey.{toml,yaml,json}` in the working
    /// directory when no path is given. Environment overrides apply in both
    /// cases.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::MissingFile(path.to_path_buf()));
                }
                builder = builder.add_source(File::from(path));
            }
            None => {
                builder = builder.add_source(File::with_name(DEFAULT_FILE_STEM).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Oracle URL and API key, both required to run a campaign.
    pub fn oracle_credentials(&self) -> Result<(&str, &str), ConfigError> {
        let url = self
            .oracle
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::Missing("oracle.url"))?;
        let api_key = self
            .oracle
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::Missing("oracle.api_key"))?;
        Ok((url, api_key))
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
