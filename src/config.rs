//! Runtime settings
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `LTR` using `__` as separator
//! (e.g. `LTR__LOGGING__LEVEL=debug`, `LTR__RANKER_CACHE=false`).

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::store::{is_store, DEFAULT_STORE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive (trace, debug, info, warn, error or a full EnvFilter)
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
    /// Directory for daily rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LtrSettings {
    /// Store used when a request does not name one
    pub default_store: String,
    /// Cache compiled rankers per (store, model, version)
    pub ranker_cache: bool,
    /// Validation strategy applied when a request carries none
    #[serde(default)]
    pub default_validation: Option<String>,
    pub logging: LoggingSettings,
}

impl Default for LtrSettings {
    fn default() -> Self {
        Self {
            default_store: DEFAULT_STORE.to_string(),
            ranker_cache: true,
            default_validation: None,
            logging: LoggingSettings::default(),
        }
    }
}

impl LtrSettings {
    /// Load settings from defaults, an optional TOML file and the environment.
    pub fn load(path: Option<&Path>) -> std::result::Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("default_store", DEFAULT_STORE)?
            .set_default("ranker_cache", true)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("LTR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        if !is_store(&self.default_store) {
            return Err(anyhow!(
                "Default store [{}] is not a valid store name",
                self.default_store
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(anyhow!("Log level cannot be empty"));
        }

        if let Some(strategy) = &self.default_validation {
            if strategy.trim().is_empty() {
                return Err(anyhow!("Default validation strategy cannot be empty"));
            }
        }

        Ok(())
    }

    /// Render the effective settings as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
