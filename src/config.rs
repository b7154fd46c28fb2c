//! Configuration management for YXC GW
//!
//! Gateway runtime tuning loaded from a YAML file. Every field has a default,
//! so a missing file (or an empty one) yields a working configuration.
//! Product settings (receiver address, input, name) are not here; they live
//! in the settings store.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub receiver: ReceiverConfig,
}

/// Reconciliation loop timers
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TimingConfig {
    /// How often the loop checks for a missing binding
    #[serde(default = "default_bind_interval")]
    pub bind_interval_ms: u64,
    /// How often a bound receiver is polled for status
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Quiet period before a volume change is written to the receiver
    #[serde(default = "default_volume_debounce")]
    pub volume_debounce_ms: u64,
}

/// Receiver connection settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReceiverConfig {
    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// SSDP search window
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            bind_interval_ms: default_bind_interval(),
            poll_interval_ms: default_poll_interval(),
            volume_debounce_ms: default_volume_debounce(),
        }
    }
}

impl TimingConfig {
    pub fn bind_interval(&self) -> Duration {
        Duration::from_millis(self.bind_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn volume_debounce(&self) -> Duration {
        Duration::from_millis(self.volume_debounce_ms)
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout(),
            discovery_timeout_ms: default_discovery_timeout(),
        }
    }
}

impl ReceiverConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }
}

impl GatewayConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::parse(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path).await
    }

    /// Parse and validate YAML text
    pub fn parse(contents: &str) -> Result<Self> {
        // An empty document deserializes to unit, not a mapping
        let config: GatewayConfig = if contents.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for correctness
    pub fn validate(&self) -> Result<()> {
        let timing = &self.timing;
        if timing.bind_interval_ms == 0 {
            anyhow::bail!("timing.bind_interval_ms must be greater than 0");
        }
        if timing.poll_interval_ms == 0 {
            anyhow::bail!("timing.poll_interval_ms must be greater than 0");
        }
        if timing.volume_debounce_ms == 0 {
            anyhow::bail!("timing.volume_debounce_ms must be greater than 0");
        }

        if self.receiver.request_timeout_ms == 0 {
            anyhow::bail!("receiver.request_timeout_ms must be greater than 0");
        }
        if self.receiver.discovery_timeout_ms == 0 {
            anyhow::bail!("receiver.discovery_timeout_ms must be greater than 0");
        }

        Ok(())
    }
}

// Default value functions
fn default_bind_interval() -> u64 { 1000 }
fn default_poll_interval() -> u64 { 5000 }
fn default_volume_debounce() -> u64 { 500 }
fn default_request_timeout() -> u64 { 3000 }
fn default_discovery_timeout() -> u64 { 3000 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.timing.bind_interval(), Duration::from_secs(1));
        assert_eq!(config.timing.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.timing.volume_debounce(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
timing:
  poll_interval_ms: 2000
receiver:
  discovery_timeout_ms: 5000
"#;
        let config = GatewayConfig::parse(yaml).unwrap();
        assert_eq!(config.timing.poll_interval_ms, 2000);
        assert_eq!(config.timing.bind_interval_ms, 1000);
        assert_eq!(config.timing.volume_debounce_ms, 500);
        assert_eq!(config.receiver.discovery_timeout_ms, 5000);
        assert_eq!(config.receiver.request_timeout_ms, 3000);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(GatewayConfig::parse("").unwrap(), GatewayConfig::default());
        assert_eq!(GatewayConfig::parse("\n  \n").unwrap(), GatewayConfig::default());
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let result = GatewayConfig::parse("timing:\n  bind_interval_ms: 0\n");
        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("bind_interval_ms"));

        let result = GatewayConfig::parse("receiver:\n  request_timeout_ms: 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        assert!(GatewayConfig::parse("timing: [1, 2").is_err());
        assert!(GatewayConfig::parse("timing:\n  poll_interval_ms: soon\n").is_err());
    }

    #[tokio::test]
    async fn test_load_or_default_missing_file() {
        let temp = tempfile::tempdir().unwrap();
        let config = GatewayConfig::load_or_default(temp.path().join("config.yaml"))
            .await
            .unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "timing:\n  volume_debounce_ms: 250\n").unwrap();

        let config = GatewayConfig::load_or_default(&path).await.unwrap();
        assert_eq!(config.timing.volume_debounce(), Duration::from_millis(250));
    }
}
