//! # Bridge Configuration
//!
//! Settings for the queue bridge, layered as: built-in defaults, an optional
//! TOML/YAML/JSON file, `BRIDGE_*` environment variables, and finally the
//! deployment variables `SOURCE_QUEUE_URL`, `STATE_MACHINE_ARN` and
//! `DATABASE_URL`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tasker_queue_bridge::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().with_file("bridge.toml").load()?;
//! let lease = config.lease_extension();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::ConfigurationError;
pub use loader::ConfigLoader;

use crate::constants::{
    queues, workflows, DEFAULT_BATCH_SIZE, DEFAULT_EXECUTION_TIMEOUT_SECONDS,
    DEFAULT_LEASE_EXTENSION_SECONDS, DEFAULT_MAX_RECEIVE_COUNT, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_EXECUTION_HISTORY, DEFAULT_REARM_VISIBILITY_SECONDS,
    DEFAULT_RECEIVE_VISIBILITY_SECONDS,
};
use crate::messaging::RedrivePolicy;

/// Complete bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Queue the processor consumes from
    pub source_queue_url: String,
    /// Workflow definition each message starts an execution of
    pub state_machine_arn: String,
    /// Queue receiving messages past `max_receive_count`
    pub dead_letter_queue_url: String,
    pub lease_extension_seconds: u64,
    pub rearm_visibility_seconds: u64,
    pub execution_timeout_seconds: u64,
    pub max_receive_count: u32,
    pub batch_size: usize,
    pub receive_visibility_seconds: u64,
    pub poll_interval_ms: u64,
    /// Finished executions kept for inspection; older ones are evicted
    pub execution_history: usize,
    /// PostgreSQL connection for the PGMQ provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            source_queue_url: queues::SOURCE_QUEUE.to_string(),
            state_machine_arn: workflows::OUTCOME_STATE_MACHINE.to_string(),
            dead_letter_queue_url: queues::DEAD_LETTER_QUEUE.to_string(),
            lease_extension_seconds: DEFAULT_LEASE_EXTENSION_SECONDS,
            rearm_visibility_seconds: DEFAULT_REARM_VISIBILITY_SECONDS,
            execution_timeout_seconds: DEFAULT_EXECUTION_TIMEOUT_SECONDS,
            max_receive_count: DEFAULT_MAX_RECEIVE_COUNT,
            batch_size: DEFAULT_BATCH_SIZE,
            receive_visibility_seconds: DEFAULT_RECEIVE_VISIBILITY_SECONDS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            execution_history: DEFAULT_EXECUTION_HISTORY,
            database_url: None,
        }
    }
}

impl BridgeConfig {
    pub fn lease_extension(&self) -> Duration {
        Duration::from_secs(self.lease_extension_seconds)
    }

    pub fn rearm_visibility(&self) -> Duration {
        Duration::from_secs(self.rearm_visibility_seconds)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_seconds)
    }

    pub fn receive_visibility(&self) -> Duration {
        Duration::from_secs(self.receive_visibility_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn redrive_policy(&self) -> RedrivePolicy {
        RedrivePolicy::new(self.dead_letter_queue_url.clone(), self.max_receive_count)
    }

    /// Check the settings are usable together
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (field, value) in [
            ("source_queue_url", &self.source_queue_url),
            ("state_machine_arn", &self.state_machine_arn),
            ("dead_letter_queue_url", &self.dead_letter_queue_url),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    field,
                    "bridge configuration",
                ));
            }
        }

        if self.source_queue_url == self.dead_letter_queue_url {
            return Err(ConfigurationError::invalid_value(
                "dead_letter_queue_url",
                &self.dead_letter_queue_url,
                "must differ from source_queue_url",
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "batch_size",
                self.batch_size,
                "must be at least 1",
            ));
        }
        if self.max_receive_count == 0 {
            return Err(ConfigurationError::invalid_value(
                "max_receive_count",
                self.max_receive_count,
                "must be at least 1",
            ));
        }
        if self.rearm_visibility_seconds >= self.lease_extension_seconds {
            return Err(ConfigurationError::invalid_value(
                "rearm_visibility_seconds",
                self.rearm_visibility_seconds,
                "must be shorter than lease_extension_seconds",
            ));
        }
        if self.execution_timeout_seconds >= self.lease_extension_seconds {
            return Err(ConfigurationError::invalid_value(
                "execution_timeout_seconds",
                self.execution_timeout_seconds,
                "must be shorter than lease_extension_seconds",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lease_extension(), Duration::from_secs(300));
        assert_eq!(config.rearm_visibility(), Duration::from_secs(5));
        assert_eq!(config.execution_timeout(), Duration::from_secs(120));
        assert_eq!(config.redrive_policy().max_receive_count, 1);
        assert_eq!(config.execution_history, 1000);
    }

    #[test]
    fn test_empty_locator_rejected() {
        let config = BridgeConfig {
            state_machine_arn: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::MissingRequiredField { field, .. }) if field == "state_machine_arn"
        ));
    }

    #[test]
    fn test_lease_must_outlast_execution() {
        let config = BridgeConfig {
            lease_extension_seconds: 60,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { field, .. }) if field == "execution_timeout_seconds"
        ));
    }

    #[test]
    fn test_rearm_must_be_shorter_than_lease() {
        let config = BridgeConfig {
            rearm_visibility_seconds: 300,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_counts_rejected() {
        let zero_batch = BridgeConfig {
            batch_size: 0,
            ..Default::default()
        };
        let zero_receives = BridgeConfig {
            max_receive_count: 0,
            ..Default::default()
        };
        assert!(zero_batch.validate().is_err());
        assert!(zero_receives.validate().is_err());
    }
}
