//! Observability infrastructure for the analytics engine
//!
//! Provides:
//! - Prometheus metrics (analysis latencies, derived-artifact counters)
//! - Structured logging helpers for significant analytics events

use prometheus::{register_histogram, register_int_gauge, Histogram, IntGauge};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for analysis latencies (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct EngineMetricsInner {
    baseline_refresh_seconds: Histogram,
    health_analysis_seconds: Histogram,
    forecast_seconds: Histogram,
    baselines_updated: IntGauge,
    anomalies_detected: IntGauge,
    health_analyses: IntGauge,
    forecasts_generated: IntGauge,
    store_errors: IntGauge,
    devices_monitored: IntGauge,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            baseline_refresh_seconds: register_histogram!(
                "filtration_baseline_refresh_seconds",
                "Time spent recomputing statistical baselines",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register baseline_refresh_seconds"),

            health_analysis_seconds: register_histogram!(
                "filtration_health_analysis_seconds",
                "Time spent analyzing filter health",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register health_analysis_seconds"),

            forecast_seconds: register_histogram!(
                "filtration_forecast_seconds",
                "Time spent generating sensor forecasts",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register forecast_seconds"),

            baselines_updated: register_int_gauge!(
                "filtration_baselines_updated_total",
                "Total number of baselines recomputed"
            )
            .expect("Failed to register baselines_updated"),

            anomalies_detected: register_int_gauge!(
                "filtration_anomalies_detected_total",
                "Total number of anomalies detected"
            )
            .expect("Failed to register anomalies_detected"),

            health_analyses: register_int_gauge!(
                "filtration_health_analyses_total",
                "Total number of filter health analyses completed"
            )
            .expect("Failed to register health_analyses"),

            forecasts_generated: register_int_gauge!(
                "filtration_forecasts_generated_total",
                "Total number of forecast horizons generated"
            )
            .expect("Failed to register forecasts_generated"),

            store_errors: register_int_gauge!(
                "filtration_store_errors_total",
                "Total number of failed store writes"
            )
            .expect("Failed to register store_errors"),

            devices_monitored: register_int_gauge!(
                "filtration_devices_monitored",
                "Number of devices with reading history"
            )
            .expect("Failed to register devices_monitored"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_baseline_refresh(&self, duration_secs: f64) {
        self.inner().baseline_refresh_seconds.observe(duration_secs);
    }

    pub fn observe_health_analysis(&self, duration_secs: f64) {
        self.inner().health_analysis_seconds.observe(duration_secs);
    }

    pub fn observe_forecast(&self, duration_secs: f64) {
        self.inner().forecast_seconds.observe(duration_secs);
    }

    pub fn inc_baselines_updated(&self) {
        self.inner().baselines_updated.inc();
    }

    pub fn add_anomalies_detected(&self, count: i64) {
        self.inner().anomalies_detected.add(count);
    }

    pub fn inc_health_analyses(&self) {
        self.inner().health_analyses.inc();
    }

    pub fn inc_forecasts_generated(&self) {
        self.inner().forecasts_generated.inc();
    }

    pub fn inc_store_errors(&self) {
        self.inner().store_errors.inc();
    }

    pub fn set_devices_monitored(&self, count: i64) {
        self.inner().devices_monitored.set(count);
    }
}

/// Structured logger for analytics events
///
/// Provides consistent event-tagged logging for anomalies, health analyses
/// and forecasts so downstream log pipelines can filter on `event`.
#[derive(Clone)]
pub struct StructuredLogger {
    system_id: String,
}

impl StructuredLogger {
    pub fn new(system_id: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
        }
    }

    pub fn log_startup(&self, version: &str) {
        info!(
            event = "service_started",
            system = %self.system_id,
            version = %version,
            "Analytics service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_stopped",
            system = %self.system_id,
            reason = %reason,
            "Analytics service stopped"
        );
    }

    /// Log an anomaly detection event; critical severities log at warn
    pub fn log_anomaly(
        &self,
        device_id: &str,
        anomaly_type: &str,
        severity: &str,
        description: &str,
    ) {
        if severity == "critical" {
            warn!(
                event = "anomaly_detected",
                system = %self.system_id,
                device_id = %device_id,
                anomaly_type = %anomaly_type,
                severity = %severity,
                description = %description,
                "Critical anomaly detected"
            );
        } else {
            info!(
                event = "anomaly_detected",
                system = %self.system_id,
                device_id = %device_id,
                anomaly_type = %anomaly_type,
                severity = %severity,
                description = %description,
                "Anomaly detected"
            );
        }
    }

    pub fn log_health_analysis(
        &self,
        health_score: f64,
        category: &str,
        days_remaining: i64,
        trend: &str,
    ) {
        info!(
            event = "health_analysis",
            system = %self.system_id,
            health_score = health_score,
            category = %category,
            days_remaining = days_remaining,
            trend = %trend,
            "Filter health analysis complete"
        );
    }

    pub fn log_forecast(&self, device_id: &str, mode: &str, points: usize, duration_ms: u128) {
        info!(
            event = "forecast_generated",
            system = %self.system_id,
            device_id = %device_id,
            mode = %mode,
            points = points,
            duration_ms = duration_ms,
            "Forecast generated"
        );
    }
}
