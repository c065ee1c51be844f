//! Layered loading of `BridgeConfig` through the `config` crate.

use std::collections::HashMap;
use std::path::PathBuf;

use config::{Config, Environment, File};
use tracing::debug;

use super::{BridgeConfig, ConfigurationError};

/// Prefix for bridge-specific environment variables, e.g. `BRIDGE_BATCH_SIZE`
pub const ENV_PREFIX: &str = "BRIDGE";

/// Unprefixed deployment variables and the fields they set
const DEPLOYMENT_VARIABLES: [(&str, &str); 3] = [
    ("SOURCE_QUEUE_URL", "source_queue_url"),
    ("STATE_MACHINE_ARN", "state_machine_arn"),
    ("DATABASE_URL", "database_url"),
];

/// Builds a validated `BridgeConfig`
#[derive(Debug, Default, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer a configuration file over the defaults; the file must exist
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Read variables from `env` instead of the process environment
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn load(&self) -> Result<BridgeConfig, ConfigurationError> {
        let mut builder = Config::builder().add_source(Config::try_from(&BridgeConfig::default())?);

        if let Some(path) = &self.file {
            if !path.exists() {
                return Err(ConfigurationError::ConfigFileNotFound { path: path.clone() });
            }
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(self.env.clone()),
        );

        for (variable, field) in DEPLOYMENT_VARIABLES {
            builder = builder.set_override_option(field, self.var(variable))?;
        }

        let config: BridgeConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn var(&self, name: &str) -> Option<String> {
        match &self.env {
            Some(env) => env.get(name).cloned(),
            None => std::env::var(name).ok(),
        }
        .filter(|value| !value.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = ConfigLoader::new().with_env(HashMap::new()).load().unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_deployment_variables_override_prefixed() {
        let config = ConfigLoader::new()
            .with_env(env(&[
                ("BRIDGE_SOURCE_QUEUE_URL", "prefixed-queue"),
                ("SOURCE_QUEUE_URL", "orders"),
                ("STATE_MACHINE_ARN", "arn:aws:states:us-east-1:123:stateMachine:outcome"),
                ("BRIDGE_BATCH_SIZE", "10"),
            ]))
            .load()
            .unwrap();

        assert_eq!(config.source_queue_url, "orders");
        assert_eq!(
            config.state_machine_arn,
            "arn:aws:states:us-east-1:123:stateMachine:outcome"
        );
        assert_eq!(config.batch_size, 10);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_file_layer() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "source_queue_url = \"from-file\"\nrearm_visibility_seconds = 10\nmax_receive_count = 3"
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_file(file.path())
            .with_env(env(&[("BRIDGE_MAX_RECEIVE_COUNT", "4")]))
            .load()
            .unwrap();

        assert_eq!(config.source_queue_url, "from-file");
        assert_eq!(config.rearm_visibility_seconds, 10);
        assert_eq!(config.max_receive_count, 4);
        assert_eq!(config.lease_extension_seconds, 300);
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::new()
            .with_file("/nonexistent/bridge.toml")
            .with_env(HashMap::new())
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::ConfigFileNotFound { .. }));
    }

    #[test]
    fn test_loaded_config_is_validated() {
        let err = ConfigLoader::new()
            .with_env(env(&[("BRIDGE_BATCH_SIZE", "0")]))
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { .. }));
    }
}
