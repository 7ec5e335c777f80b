//! Configuration loading from various sources

use crate::config::FleetConfig;
use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use std::path::Path;
use validator::Validate;

/// Layers a base TOML file, an environment-specific TOML file, a local
/// override file, an optional secrets file carrying the JWT signing key
/// (kept out of `default`/`local` so it never lands in a checked-in file),
/// and `FLEET__`-prefixed environment variables, in that order of
/// increasing precedence. YAML sources are intentionally not supported
/// here (out of scope for this core).
///
/// `load` and `load_from_file` both validate the result with
/// [`FleetConfig`]'s `Validate` derive before returning it, the same check
/// `ConfigManager::reload_config` runs on every hot-reload — an agent
/// fleet that boots against a config with e.g. `max_agents = 0` should
/// fail at startup, not at the first registration.
pub struct ConfigLoader {
    config_dir: String,
    environment: String,
}

impl ConfigLoader {
    pub fn new(config_dir: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            config_dir: config_dir.into(),
            environment: environment.into(),
        }
    }

    pub fn load(&self) -> Result<FleetConfig, ConfigError> {
        let mut builder = Config::builder();

        builder = builder.add_source(
            File::with_name(&format!("{}/default", self.config_dir)).required(false),
        );

        builder = builder.add_source(
            File::with_name(&format!("{}/{}", self.config_dir, self.environment))
                .required(false),
        );

        builder = builder.add_source(
            File::with_name(&format!("{}/local", self.config_dir)).required(false),
        );

        builder = builder.add_source(
            File::with_name(&format!("{}/secrets", self.config_dir)).required(false),
        );

        builder = builder.add_source(
            Environment::with_prefix("FLEET")
                .separator("__")
                .try_parsing(true),
        );

        let config: FleetConfig = builder.build()?.try_deserialize()?;
        Self::validated(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<FleetConfig, ConfigError> {
        let config: FleetConfig = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;

        Self::validated(config)
    }

    pub fn load_from_env() -> Result<FleetConfig, ConfigError> {
        let config: FleetConfig = Config::builder()
            .add_source(
                Environment::with_prefix("FLEET")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Self::validated(config)
    }

    fn validated(config: FleetConfig) -> Result<FleetConfig, ConfigError> {
        config
            .validate()
            .map_err(|e| ConfigError::Message(format!("invalid configuration: {e}")))?;
        Ok(config)
    }
}
