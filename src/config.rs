//! Composition engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{CompositionError, CompositionResult};

/// Tunables for the composition manager and the trees it instantiates
///
/// Missing fields in a JSON document fall back to their defaults:
///
/// ```
/// use cim_flow_composition::CompositionConfig;
///
/// let config = CompositionConfig::from_json(r#"{ "installer_workers": 8 }"#).unwrap();
/// assert_eq!(config.installer_workers, 8);
/// assert_eq!(config.install_retry_attempts, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    /// Number of installer tasks allowed to talk to devices at once
    pub installer_workers: usize,
    /// Attempts to find a device pipeliner before reporting NOPIPELINER
    pub install_retry_attempts: u32,
    /// Wait between pipeliner lookups, in milliseconds
    pub install_retry_delay_ms: u64,
    /// Left-priority multiplier of sequential composition
    pub priority_multiplier: i32,
    /// Priority bonus of the left branch of override composition
    pub priority_addend: i32,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            installer_workers: 4,
            install_retry_attempts: 5,
            install_retry_delay_ms: 1000,
            priority_multiplier: 10,
            priority_addend: 10,
        }
    }
}

impl CompositionConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> CompositionResult<Self> {
        let config: CompositionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the installer pool size
    pub fn with_installer_workers(mut self, workers: usize) -> Self {
        self.installer_workers = workers;
        self
    }

    /// Set the retry ceiling and the delay between attempts
    pub fn with_install_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.install_retry_attempts = attempts;
        self.install_retry_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set the sequential multiplier and override addend
    pub fn with_priorities(mut self, multiplier: i32, addend: i32) -> Self {
        self.priority_multiplier = multiplier;
        self.priority_addend = addend;
        self
    }

    /// Wait between pipeliner lookups
    pub fn install_retry_delay(&self) -> Duration {
        Duration::from_millis(self.install_retry_delay_ms)
    }

    /// Reject values the manager cannot run with
    pub fn validate(&self) -> CompositionResult<()> {
        if self.installer_workers == 0 {
            return Err(CompositionError::InvalidConfig(
                "installer_workers must be at least 1".to_string(),
            ));
        }
        if self.install_retry_attempts == 0 {
            return Err(CompositionError::InvalidConfig(
                "install_retry_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompositionConfig::default();
        assert_eq!(config.installer_workers, 4);
        assert_eq!(config.install_retry_attempts, 5);
        assert_eq!(config.install_retry_delay(), Duration::from_secs(1));
        assert_eq!(config.priority_multiplier, 10);
        assert_eq!(config.priority_addend, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = CompositionConfig::default()
            .with_installer_workers(2)
            .with_install_retry(3, Duration::from_millis(20))
            .with_priorities(100, 1);
        assert_eq!(config.installer_workers, 2);
        assert_eq!(config.install_retry_attempts, 3);
        assert_eq!(config.install_retry_delay_ms, 20);
        assert_eq!(config.priority_multiplier, 100);
        assert_eq!(config.priority_addend, 1);
    }

    #[test]
    fn test_invalid_json_values_rejected() {
        let err = CompositionConfig::from_json(r#"{ "installer_workers": 0 }"#).unwrap_err();
        assert!(err.is_configuration_error());

        let err = CompositionConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, CompositionError::ConfigFormat(_)));
    }
}
