//! Runtime configuration
//!
//! Settings are layered, later layers winning:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, or `LOKASCRIPT_CONFIG_PATH`)
//! 3. `LOKASCRIPT_*` environment variables (a `.env` file is loaded first)
//! 4. explicit builder overrides

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;

pub const ENV_PREFIX: &str = "LOKASCRIPT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound for a behavior's init block and for each handler attachment
    pub behavior_timeout_ms: u64,
    /// Accepted for compatibility; generic commands are never timed out
    pub command_timeout_ms: Option<u64>,
    /// Nested same-event invocations allowed before re-entry is dropped
    pub max_event_recursion_depth: usize,
    /// Reclaim listeners of elements removed from the document
    pub auto_cleanup: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            behavior_timeout_ms: 10_000,
            command_timeout_ms: None,
            max_event_recursion_depth: 100,
            auto_cleanup: true,
        }
    }
}

impl RuntimeConfig {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from the default locations (file from env, env vars)
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    /// Parse a TOML document directly, skipping file and environment layers
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig =
            toml::from_str(source).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.behavior_timeout_ms == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "behavior_timeout_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.max_event_recursion_depth == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "max_event_recursion_depth".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.command_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidSetting {
                key: "command_timeout_ms".into(),
                reason: "must be greater than zero when set".into(),
            });
        }
        Ok(())
    }

    pub fn behavior_timeout(&self) -> Duration {
        Duration::from_millis(self.behavior_timeout_ms)
    }
}

/* ===================== Builder ===================== */

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    skip_env: bool,
    behavior_timeout_ms: Option<u64>,
    max_event_recursion_depth: Option<usize>,
    auto_cleanup: Option<bool>,
}

impl ConfigBuilder {
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Ignore `.env` and `LOKASCRIPT_*` variables
    pub fn without_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    pub fn behavior_timeout_ms(mut self, ms: Option<u64>) -> Self {
        self.behavior_timeout_ms = ms;
        self
    }

    pub fn max_event_recursion_depth(mut self, depth: Option<usize>) -> Self {
        self.max_event_recursion_depth = depth;
        self
    }

    pub fn auto_cleanup(mut self, enabled: Option<bool>) -> Self {
        self.auto_cleanup = enabled;
        self
    }

    pub fn build(self) -> Result<RuntimeConfig, ConfigError> {
        if !self.skip_env {
            dotenvy::dotenv().ok();
        }

        let path = self.config_path.clone().or_else(|| {
            if self.skip_env {
                None
            } else {
                std::env::var(format!("{}_CONFIG_PATH", ENV_PREFIX))
                    .ok()
                    .map(PathBuf::from)
            }
        });

        let mut sources = config::Config::builder();
        if let Some(path) = &path {
            if !path.exists() {
                return Err(ConfigError::Load(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            sources = sources.add_source(config::File::from(path.as_path()).required(true));
        }
        if !self.skip_env {
            sources = sources.add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .try_parsing(true),
            );
        }

        let mut config: RuntimeConfig = sources
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        if let Some(ms) = self.behavior_timeout_ms {
            config.behavior_timeout_ms = ms;
        }
        if let Some(depth) = self.max_event_recursion_depth {
            config.max_event_recursion_depth = depth;
        }
        if let Some(enabled) = self.auto_cleanup {
            config.auto_cleanup = enabled;
        }

        config.validate()?;
        Ok(config)
    }
}
