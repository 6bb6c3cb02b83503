//! Engine Configuration
//!
//! Runtime knobs for the engine and the mock simulator. Every field has a
//! default so a partial YAML file (or none at all) is enough.

use std::error::Error;
use std::fs;

use serde::{Deserialize, Serialize};

/// Configuration for the mock execution simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockConfig {
    /// Probability in [0.0, 1.0] that a simulated step attempt fails.
    #[serde(default)]
    pub failure_rate: f64,

    /// Uniform random per-step delay bounds in milliseconds.
    #[serde(default = "default_delay_range")]
    pub delay_range_ms: (u64, u64),

    /// Maximum simulations allowed to run at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_delay_range() -> (u64, u64) {
    (10, 50)
}

fn default_max_concurrent() -> usize {
    num_cpus::get()
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            failure_rate: 0.0,
            delay_range_ms: default_delay_range(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Timeout applied to steps that set none of their own.
    #[serde(default = "default_step_timeout_ms")]
    pub default_step_timeout_ms: u64,

    /// Retry floor applied on top of per-step retry settings.
    #[serde(default)]
    pub default_max_retries: u32,

    /// Bound on the monitor's in-memory event log.
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,

    #[serde(default)]
    pub mock: MockConfig,
}

fn default_step_timeout_ms() -> u64 {
    30_000
}

fn default_event_log_capacity() -> usize {
    10_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_step_timeout_ms: default_step_timeout_ms(),
            default_max_retries: 0,
            event_log_capacity: default_event_log_capacity(),
            mock: MockConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a YAML file.
    pub fn load(path: &str) -> Result<Self, Box<dyn Error>> {
        let content = fs::read_to_string(path).map_err(|e| {
            format!(
                "Failed to read config file '{}': {}. Check that the file exists and is readable.",
                path, e
            )
        })?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| format!("Failed to parse config YAML: {}. Check the file format.", e))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_step_timeout_ms, 30_000);
        assert_eq!(config.default_max_retries, 0);
        assert_eq!(config.event_log_capacity, 10_000);
        assert_eq!(config.mock.failure_rate, 0.0);
        assert!(config.mock.max_concurrent >= 1);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
default_step_timeout_ms: 5000
mock:
  failure_rate: 0.25
"#;
        let config: EngineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.default_step_timeout_ms, 5000);
        assert_eq!(config.mock.failure_rate, 0.25);
        assert_eq!(config.event_log_capacity, 10_000);
        assert_eq!(config.mock.delay_range_ms, (10, 50));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "default_max_retries: 2\n").unwrap();

        let config = EngineConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.default_max_retries, 2);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(EngineConfig::load("/nonexistent/config.yaml").is_err());
    }
}
