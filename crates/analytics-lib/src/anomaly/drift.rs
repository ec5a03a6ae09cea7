//! Gradual sensor drift detection
//!
//! Single-reading z-scores miss slow degradation: a sensor that creeps a
//! fraction of a standard deviation per day never trips the spike bands.
//! Drift detection instead compares the mean of a short recent window
//! against the historical baseline mean, per metric.

use super::AnomalyConfig;
use crate::baseline::metric_stats;
use crate::models::{Anomaly, AnomalyType, Baseline, Metric, Reading, Severity};
use chrono::Utc;

/// Compare a recent window of readings against a historical baseline
///
/// Flags a `Drift` anomaly per metric whose recent mean moved more than the
/// configured percentage away from the baseline mean. Metrics with a zero
/// baseline mean are skipped. Requires `drift_min_window` recent readings.
pub fn detect_drift(
    config: &AnomalyConfig,
    recent: &[Reading],
    baseline: &Baseline,
) -> Vec<Anomaly> {
    let window: Vec<&Reading> = recent
        .iter()
        .filter(|r| r.device_id == baseline.device_id && r.mode == baseline.mode)
        .collect();

    if window.len() < config.drift_min_window {
        return Vec::new();
    }

    let mut anomalies = Vec::new();
    let now = Utc::now();

    for &metric in Metric::ALL.iter() {
        let historical_mean = baseline.stats(metric).mean;
        if historical_mean == 0.0 {
            continue;
        }

        let values: Vec<f64> = window.iter().map(|r| r.value(metric)).collect();
        let recent_mean = metric_stats(&values).mean;

        let drift_pct = ((recent_mean - historical_mean) / historical_mean * 100.0).abs();
        if drift_pct <= config.drift_threshold_pct {
            continue;
        }

        let severity = if drift_pct > config.drift_high_pct {
            Severity::High
        } else {
            Severity::Medium
        };

        anomalies.push(Anomaly {
            device_id: baseline.device_id.clone(),
            mode: baseline.mode,
            anomaly_type: AnomalyType::Drift,
            severity,
            affected_metric: metric,
            expected_value: historical_mean,
            actual_value: recent_mean,
            deviation_pct: drift_pct,
            description: format!(
                "{metric} sensor drift detected: {drift_pct:.1}% change from baseline"
            ),
            detected_at: now,
            resolved_at: None,
            is_false_positive: false,
            alert_sent: false,
            auto_resolved: false,
        });
    }

    anomalies
}
