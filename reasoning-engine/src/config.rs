//! Engine configuration.
//!
//! Loaded from YAML (every field optional, defaults below) and then
//! overridden from `REASONING_*` environment variables.

use anyhow::{bail, Context, Result};
use reasoning_engine_sdk::{DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_DEFAULT_TIMEOUT_MS: &str = "REASONING_DEFAULT_TIMEOUT_MS";
pub const ENV_MAX_RETRIES: &str = "REASONING_MAX_RETRIES";
pub const ENV_RETRY_BASE_DELAY_MS: &str = "REASONING_RETRY_BASE_DELAY_MS";

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeout applied when a request carries none
    pub default_timeout_ms: u64,

    /// Per-step retry policy
    pub retry: RetryConfig,

    /// Plan registry bounds
    pub registry: RegistryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            retry: RetryConfig::default(),
            registry: RegistryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first failed attempt
    pub max_retries: u32,

    /// Backoff unit; the n-th retry waits `base_delay_ms * n`
    pub base_delay_ms: u64,

    /// Multiplier applied to a step's confidence on each retried failure
    pub confidence_decay: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: 100,
            confidence_decay: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Upper bound on retained plans; only terminal plans are evicted
    pub max_plans: usize,

    /// How long a terminal plan stays queryable
    pub terminal_ttl_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_plans: 1024,
            terminal_ttl_secs: 3600,
        }
    }
}

impl RegistryConfig {
    pub fn terminal_ttl(&self) -> Duration {
        Duration::from_secs(self.terminal_ttl_secs)
    }
}

impl EngineConfig {
    /// Parse configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_yaml::from_str(yaml).context("Failed to parse engine config YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml_str(&yaml)
    }

    /// Apply `REASONING_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_DEFAULT_TIMEOUT_MS) {
            self.default_timeout_ms = parse_env(ENV_DEFAULT_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_RETRIES) {
            self.retry.max_retries = parse_env(ENV_MAX_RETRIES, &value)?;
        }
        if let Some(value) = lookup(ENV_RETRY_BASE_DELAY_MS) {
            self.retry.base_delay_ms = parse_env(ENV_RETRY_BASE_DELAY_MS, &value)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_timeout_ms == 0 {
            bail!("default_timeout_ms must be positive");
        }
        if !(self.retry.confidence_decay > 0.0 && self.retry.confidence_decay <= 1.0) {
            bail!(
                "retry.confidence_decay must be in (0, 1], got {}",
                self.retry.confidence_decay
            );
        }
        if self.registry.max_plans == 0 {
            bail!("registry.max_plans must be at least 1");
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: '{}' ({})", key, value, e))
}
