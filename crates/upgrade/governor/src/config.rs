//! Governor configuration.
//!
//! ```toml
//! [voting]
//! quorum = 5
//! approval_threshold = 0.66
//! default_voting_period_secs = 604800
//!
//! [voting.role_weights]
//! admin = 3
//! auditor = 2
//!
//! [pipeline]
//! stage_timeout_ms = 300000
//! advisory_stages = ["performance_benchmark"]
//!
//! [deployment]
//! environment = "production"
//! lock_mode = "block"
//! step_timeout_ms = 30000
//!
//! [governor]
//! auto_run_pipeline = true
//! log_filter = "info"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use upgrade_deploy::DeploymentConfig;
use upgrade_pipeline::PipelineConfig;
use upgrade_voting::VotingConfig;

use crate::error::{GovernorError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorSettings {
    /// Start the test pipeline in the background as soon as a proposal is
    /// approved.
    pub auto_run_pipeline: bool,
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for GovernorSettings {
    fn default() -> Self {
        Self {
            auto_run_pipeline: true,
            log_filter: "info".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    pub voting: VotingConfig,
    pub pipeline: PipelineConfig,
    pub deployment: DeploymentConfig,
    pub governor: GovernorSettings,
}

impl GovernorConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| GovernorError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: GovernorConfig =
            toml::from_str(contents).map_err(|e| GovernorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| GovernorError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.voting
            .validate()
            .map_err(|e| GovernorError::Config(e.to_string()))?;
        if self.pipeline.stage_timeout_ms == 0 {
            return Err(GovernorError::Config("stage_timeout_ms must be positive".into()));
        }
        if self.deployment.step_timeout_ms == 0 {
            return Err(GovernorError::Config("step_timeout_ms must be positive".into()));
        }
        if self.deployment.environment.trim().is_empty() {
            return Err(GovernorError::Config("deployment environment is blank".into()));
        }
        Ok(())
    }
}
