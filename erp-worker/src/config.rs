//! Worker configuration
//!
//! Read the same way as the API server: `.env`, optional `config/erp.toml`,
//! then `ERP__*` environment variables. Only `ERP__MASTER_DATABASE__URL` is
//! required.

use std::time::Duration;

use anyhow::Context;
use config::{Environment, File};
use erp_shared::data::ExecutionStrategy;
use erp_shared::db::pool::DatabaseConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub master_database: DatabaseConfig,
    pub sweeper: SweeperConfig,
    pub retry: RetryConfig,
}

/// Subscription sweep schedule
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    pub interval_seconds: u64,

    /// Months added per renewal of an auto-renewing subscription
    pub renew_months: u32,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 3600,
            renew_months: 12,
        }
    }
}

impl SweeperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let strategy = ExecutionStrategy::default();
        Self {
            max_retries: strategy.max_retries,
            base_delay_ms: strategy.base_delay.as_millis() as u64,
            max_delay_ms: strategy.max_delay.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

impl WorkerConfig {
    /// Loads configuration from `.env`, `config/erp.toml` and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or a value is invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config: WorkerConfig = config::Config::builder()
            .add_source(File::with_name("config/erp").required(false))
            .add_source(
                Environment::with_prefix("ERP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.master_database.url.trim().is_empty() {
            anyhow::bail!("ERP__MASTER_DATABASE__URL is required");
        }
        if self.sweeper.interval_seconds == 0 {
            anyhow::bail!("sweeper.interval_seconds must be positive");
        }
        if self.sweeper.renew_months == 0 {
            anyhow::bail!("sweeper.renew_months must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_need_a_database_url() {
        let mut config = WorkerConfig::default();
        assert!(config.validate().is_err());

        config.master_database.url = "postgresql://localhost/erp_master".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.sweeper.interval(), Duration::from_secs(3600));
        assert_eq!(config.retry.strategy(), ExecutionStrategy::default());
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut config = WorkerConfig::default();
        config.master_database.url = "postgresql://localhost/erp_master".to_string();
        config.sweeper.interval_seconds = 0;
        assert!(config.validate().is_err());
    }
}
