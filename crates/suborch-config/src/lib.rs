//! Shared configuration for sub-orchestrator processes.
//!
//! A sub-orchestrator needs very little process-level configuration: the
//! project it publishes responses into, and how it should emit structured
//! logs. Values are layered by `ortho_config` in the usual order: built-in
//! defaults, then an optional TOML file named by `--config-path` or
//! `SUBORCH_CONFIG_PATH`, then `SUBORCH_*` environment variables, then
//! command-line flags.

mod defaults;
mod logging;

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_LOG_FILTER, default_log_filter, default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SUBORCH")]
pub struct Config {
    /// Project (namespace) that bare response topics are resolved against.
    #[serde(default)]
    #[ortho_config(default = String::new())]
    pub project_id: String,
    /// `tracing` filter expression, for example `info` or `suborch=debug`.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for structured logs.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment, then
    /// validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when a layer fails to parse and
    /// [`ConfigError::InvalidProjectId`] when the resolved project id cannot
    /// be used in a topic path.
    pub fn load_validated() -> Result<Self, ConfigError> {
        let config = Self::load().map_err(ConfigError::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that the layered loader cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidProjectId`] when the project id contains
    /// a path separator or surrounding whitespace.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let project = self.project_id.as_str();
        if project.contains('/') || project.trim() != project {
            return Err(ConfigError::InvalidProjectId {
                project_id: project.to_owned(),
            });
        }
        Ok(())
    }

    /// Project id used to qualify bare response topics.
    ///
    /// Hosts return this from their `Orchestrator::project_id`
    /// implementation so bare topics resolve into the configured project.
    #[must_use]
    pub const fn project_id(&self) -> &str {
        self.project_id.as_str()
    }

    /// Log filter expression.
    #[must_use]
    pub const fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more configuration layers failed to load.
    #[error("failed to load configuration: {0}")]
    Load(#[source] Arc<OrthoError>),
    /// The project id cannot be embedded in a `projects/{id}/topics/{name}` path.
    #[error("project id '{project_id}' must not contain '/' or surrounding whitespace")]
    InvalidProjectId {
        /// The rejected value.
        project_id: String,
    },
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn default_config_uses_builtin_values() {
        let config = Config::default();
        assert_eq!(config.project_id(), "");
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
        assert_eq!(config.log_format(), LogFormat::Json);
    }

    #[rstest]
    #[case::empty("")]
    #[case::simple("ent-platform-dev")]
    fn validate_accepts_plain_project_ids(#[case] project: &str) {
        let config = Config {
            project_id: project.to_owned(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case::slash("projects/foo")]
    #[case::leading_space(" foo")]
    #[case::trailing_space("foo ")]
    fn validate_rejects_unusable_project_ids(#[case] project: &str) {
        let config = Config {
            project_id: project.to_owned(),
            ..Config::default()
        };
        let error = config.validate().expect_err("project id should be rejected");
        assert!(matches!(error, ConfigError::InvalidProjectId { .. }));
        assert!(error.to_string().contains(project));
    }
}
