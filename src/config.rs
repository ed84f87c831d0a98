//! Configuration for the auction watcher.

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::currency::Currency;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub currency: CurrencyConfig,
    #[serde(default)]
    pub watcher: WatcherSettings,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApiConfig {
    #[validate(url)]
    pub base_url: String,
    /// Optional conversion-rate endpoint; when unset the static rate table
    /// in `[currency]` is used.
    #[validate(url)]
    pub rates_url: Option<String>,
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConfig {
    /// Currency every server-side amount is denominated in.
    pub canonical: String,
    /// Default display currency for viewers that don't override it.
    pub display: String,
    /// Units of each currency per one canonical unit.
    pub rates: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WatcherSettings {
    #[validate(range(min = 1, max = 300))]
    pub poll_interval_secs: u64,
    #[validate(range(min = 1, max = 60))]
    pub tick_interval_secs: u64,
    /// Canonical-unit gap between the current bid and the minimum next bid.
    #[validate(range(min = 1))]
    pub bid_increment: i64,
}

/// Backoff policy for transient read failures during polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000/api".to_string(),
            rates_url: None,
            request_timeout_secs: 30,
        }
    }
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            canonical: "NGN".to_string(),
            display: "NGN".to_string(),
            rates: HashMap::from([("NGN".to_string(), 1.0)]),
        }
    }
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            tick_interval_secs: 1,
            bid_increment: 250,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl WatchConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        Validate::validate(&self.api)?;
        Validate::validate(&self.watcher)?;
        self.currency.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}

impl CurrencyConfig {
    fn validate(&self) -> Result<()> {
        if self.canonical.is_empty() {
            return Err(anyhow::anyhow!("canonical currency cannot be empty"));
        }
        if self.rates.is_empty() {
            return Err(anyhow::anyhow!("currency rate table cannot be empty"));
        }
        for (code, rate) in &self.rates {
            if *rate <= 0.0 {
                return Err(anyhow::anyhow!("rate for {code} must be positive"));
            }
        }
        Ok(())
    }

    pub fn display_currency(&self) -> Currency {
        Currency::new(&self.display)
    }

    /// Rate table keyed by normalized currency code.
    pub fn rate_table(&self) -> HashMap<Currency, f64> {
        self.rates
            .iter()
            .map(|(code, rate)| (Currency::new(code), *rate))
            .collect()
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(anyhow::anyhow!("base_delay_ms must be greater than 0"));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(anyhow::anyhow!(
                "max_delay_ms must be at least base_delay_ms ({})",
                self.base_delay_ms
            ));
        }
        if self.backoff_multiplier <= 1.0 {
            return Err(anyhow::anyhow!("backoff_multiplier must be greater than 1.0"));
        }
        Ok(())
    }

    /// Delay before the given retry attempt, capped at `max_delay_ms`.
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        if attempt == 0 {
            return self.base_delay_ms;
        }
        let exponential = self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        (exponential as u64).min(self.max_delay_ms)
    }
}
