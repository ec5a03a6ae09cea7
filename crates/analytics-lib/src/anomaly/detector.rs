//! Single-reading anomaly classification
//!
//! Compares one live reading against a baseline per metric. Classification
//! priority: spike, sudden drop, outlier, then sensor failure. The sensor
//! failure check does not need a baseline at all: an impossible value is
//! flagged critical even on a device with no history.

use super::AnomalyConfig;
use crate::models::{Anomaly, AnomalyType, Baseline, Metric, Reading, Severity};
use chrono::Utc;

/// Detects anomalies in individual sensor readings
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
}

impl AnomalyDetector {
    pub fn new(config: AnomalyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    /// Analyze a reading against a baseline, one evaluation per metric
    ///
    /// Returns zero to four anomalies. Z-score classes require a baseline
    /// with at least `min_baseline_samples`; the physical-range check runs
    /// regardless, so sensor failures are caught on fresh devices too.
    pub fn detect(&self, reading: &Reading, baseline: Option<&Baseline>) -> Vec<Anomaly> {
        let usable = baseline.filter(|b| b.sample_size >= self.config.min_baseline_samples);

        Metric::ALL
            .iter()
            .filter_map(|&metric| self.check_metric(reading, usable, metric))
            .collect()
    }

    fn check_metric(
        &self,
        reading: &Reading,
        baseline: Option<&Baseline>,
        metric: Metric,
    ) -> Option<Anomaly> {
        let actual = reading.value(metric);

        if let Some(baseline) = baseline {
            let stats = baseline.stats(metric);
            let z_score = if stats.std_dev > 0.0 {
                (actual - stats.mean) / stats.std_dev
            } else {
                0.0
            };
            let abs_z = z_score.abs();
            let spike_band = self.config.spike_multiplier * stats.std_dev;

            let (anomaly_type, severity) = if actual > stats.mean + spike_band
                && abs_z > self.config.z_score_threshold
            {
                (AnomalyType::Spike, severity_from_z(abs_z))
            } else if actual < stats.mean - spike_band && abs_z > self.config.z_score_threshold {
                (AnomalyType::SuddenDrop, severity_from_z(abs_z))
            } else if abs_z > self.config.z_score_threshold {
                (AnomalyType::Outlier, severity_from_z(abs_z))
            } else if is_sensor_failure(metric, actual) {
                (AnomalyType::SensorFailure, Severity::Critical)
            } else {
                return None;
            };

            let deviation_pct = if stats.mean != 0.0 {
                ((actual - stats.mean) / stats.mean * 100.0).abs()
            } else {
                0.0
            };

            Some(self.build_anomaly(
                reading,
                metric,
                anomaly_type,
                severity,
                stats.mean,
                actual,
                deviation_pct,
            ))
        } else if is_sensor_failure(metric, actual) {
            // No usable baseline: only the physical-range check applies
            Some(self.build_anomaly(
                reading,
                metric,
                AnomalyType::SensorFailure,
                Severity::Critical,
                0.0,
                actual,
                0.0,
            ))
        } else {
            None
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_anomaly(
        &self,
        reading: &Reading,
        metric: Metric,
        anomaly_type: AnomalyType,
        severity: Severity,
        expected: f64,
        actual: f64,
        deviation_pct: f64,
    ) -> Anomaly {
        let description = match anomaly_type {
            AnomalyType::Spike => {
                format!("{metric} spike detected: {actual:.2} (expected ~{expected:.2})")
            }
            AnomalyType::SuddenDrop => {
                format!("{metric} sudden drop detected: {actual:.2} (expected ~{expected:.2})")
            }
            AnomalyType::Outlier => {
                format!("{metric} outlier detected: {actual:.2} (expected ~{expected:.2})")
            }
            AnomalyType::SensorFailure => {
                format!("{metric} sensor failure suspected: value {actual:.2} is outside possible range")
            }
            AnomalyType::Drift => unreachable!("drift is produced by detect_drift"),
        };

        Anomaly {
            device_id: reading.device_id.clone(),
            mode: reading.mode,
            anomaly_type,
            severity,
            affected_metric: metric,
            expected_value: expected,
            actual_value: actual,
            deviation_pct,
            description,
            detected_at: Utc::now(),
            resolved_at: None,
            is_false_positive: false,
            alert_sent: false,
            auto_resolved: false,
        }
    }
}

/// Severity bands over |z|: rarer deviations are more severe
fn severity_from_z(abs_z: f64) -> Severity {
    if abs_z >= 6.0 {
        Severity::Critical
    } else if abs_z >= 4.5 {
        Severity::High
    } else if abs_z >= 3.5 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// True when the value lies outside the metric's physically possible range
fn is_sensor_failure(metric: Metric, value: f64) -> bool {
    let (lo, hi) = metric.physical_range();
    value < lo || value > hi
}
