//! Agent configuration

use analytics_lib::ServiceConfig;
use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Baseline recomputation interval in seconds
    #[serde(default = "default_baseline_interval")]
    pub baseline_interval_secs: u64,

    /// Filter health analysis interval in seconds
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,

    /// Forecast refresh interval in seconds
    #[serde(default = "default_forecast_interval")]
    pub forecast_interval_secs: u64,

    /// Device id of the pre-filtration sensor bank
    #[serde(default = "default_pre_device")]
    pub pre_device: String,

    /// Device id of the post-filtration sensor bank
    #[serde(default = "default_post_device")]
    pub post_device: String,

    /// Run anomaly detection on every incoming reading
    #[serde(default = "default_true")]
    pub realtime_anomaly: bool,

    /// Refresh the forecast when a new reading arrives
    #[serde(default = "default_true")]
    pub auto_forecast: bool,
}

fn default_baseline_interval() -> u64 {
    60 * 60
}

fn default_health_interval() -> u64 {
    30 * 60
}

fn default_forecast_interval() -> u64 {
    2 * 60 * 60
}

fn default_pre_device() -> String {
    "filter_pre".to_string()
}

fn default_post_device() -> String {
    "filter_post".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            baseline_interval_secs: default_baseline_interval(),
            health_interval_secs: default_health_interval(),
            forecast_interval_secs: default_forecast_interval(),
            pre_device: default_pre_device(),
            post_device: default_post_device(),
            realtime_anomaly: true,
            auto_forecast: true,
        }
    }
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("FILTRATION"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }

    /// Map onto the analytics service's scheduling configuration
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            baseline_interval: Duration::from_secs(self.baseline_interval_secs),
            health_interval: Duration::from_secs(self.health_interval_secs),
            forecast_interval: Duration::from_secs(self.forecast_interval_secs),
            pre_device: self.pre_device.clone(),
            post_device: self.post_device.clone(),
            realtime_anomaly: self.realtime_anomaly,
            auto_forecast: self.auto_forecast,
            ..ServiceConfig::default()
        }
    }
}
