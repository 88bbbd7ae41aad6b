//! Flow configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::{
    CHALLENGE_TTL_SECS, MOCK_PASS_RATE, SUCCESS_EXIT_DELAY_MS, TICK_INTERVAL_MS,
    VERIFIER_TIMEOUT_MS,
};

/// Where challenges come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifierMode {
    /// In-process mock verifier
    Mock,
    /// Remote verifier over HTTP
    Http,
}

/// Verifier connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierConfig {
    #[serde(default = "default_mode")]
    pub mode: VerifierMode,

    /// Base URL of the verifier API, required in http mode
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Mock verifier behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockConfig {
    /// Probability a well-formed response passes
    #[serde(default = "default_pass_rate")]
    pub pass_rate: f64,

    /// Seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,

    /// Seconds an unanswered challenge stays valid
    #[serde(default = "default_challenge_ttl_secs")]
    pub challenge_ttl_secs: u64,
}

/// Configuration for one flow instance and its collaborators.
///
/// Load from TOML via [`FlowConfig::from_toml_file`] or build in code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Countdown tick period
    #[serde(default = "default_tick_ms")]
    pub tick_interval_ms: u64,

    /// Delay before the exit signal after success
    #[serde(default = "default_exit_delay_ms")]
    pub success_exit_delay_ms: u64,

    /// "human" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub verifier: VerifierConfig,

    #[serde(default)]
    pub mock: MockConfig,
}

fn default_mode() -> VerifierMode {
    VerifierMode::Mock
}

fn default_timeout_ms() -> u64 {
    VERIFIER_TIMEOUT_MS
}

fn default_pass_rate() -> f64 {
    MOCK_PASS_RATE
}

fn default_challenge_ttl_secs() -> u64 {
    CHALLENGE_TTL_SECS
}

fn default_tick_ms() -> u64 {
    TICK_INTERVAL_MS
}

fn default_exit_delay_ms() -> u64 {
    SUCCESS_EXIT_DELAY_MS
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            base_url: None,
            request_timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            pass_rate: default_pass_rate(),
            seed: None,
            challenge_ttl_secs: default_challenge_ttl_secs(),
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_ms(),
            success_exit_delay_ms: default_exit_delay_ms(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            verifier: VerifierConfig::default(),
            mock: MockConfig::default(),
        }
    }
}

impl FlowConfig {
    /// Load and validate a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.mock.pass_rate) {
            return Err(ConfigError::Invalid(format!(
                "mock.pass_rate must be within [0, 1], got {}",
                self.mock.pass_rate
            )));
        }
        if self.mock.challenge_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "mock.challenge_ttl_secs must be positive".into(),
            ));
        }
        if self.verifier.mode == VerifierMode::Http && self.verifier.base_url.is_none() {
            return Err(ConfigError::Invalid(
                "verifier.base_url is required in http mode".into(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn success_exit_delay(&self) -> Duration {
        Duration::from_millis(self.success_exit_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.verifier.request_timeout_ms)
    }

    pub fn challenge_ttl(&self) -> Duration {
        Duration::from_secs(self.mock.challenge_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = FlowConfig::from_toml_str("").unwrap();
        assert_eq!(config, FlowConfig::default());
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.success_exit_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_override() {
        let toml = r#"
            success_exit_delay_ms = 500

            [verifier]
            mode = "http"
            base_url = "http://127.0.0.1:3000"

            [mock]
            seed = 7
        "#;
        let config = FlowConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.success_exit_delay_ms, 500);
        assert_eq!(config.tick_interval_ms, 1000);
        assert_eq!(config.verifier.mode, VerifierMode::Http);
        assert_eq!(config.mock.seed, Some(7));
        assert_eq!(config.mock.pass_rate, 0.7);
    }

    #[test]
    fn test_http_without_url_is_invalid() {
        let err = FlowConfig::from_toml_str("[verifier]\nmode = \"http\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_tick_is_invalid() {
        assert!(FlowConfig::from_toml_str("tick_interval_ms = 0").is_err());
    }

    #[test]
    fn test_pass_rate_bounds() {
        assert!(FlowConfig::from_toml_str("[mock]\npass_rate = 1.5").is_err());
    }

    #[test]
    fn test_challenge_ttl() {
        assert_eq!(FlowConfig::default().challenge_ttl(), Duration::from_secs(300));
        let config = FlowConfig::from_toml_str("[mock]\nchallenge_ttl_secs = 30").unwrap();
        assert_eq!(config.challenge_ttl(), Duration::from_secs(30));
        assert!(FlowConfig::from_toml_str("[mock]\nchallenge_ttl_secs = 0").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = FlowConfig::from_toml_file("/nonexistent/popai.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
