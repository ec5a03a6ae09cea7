//! Anomaly detection for sensor readings
//!
//! This module provides detection for:
//! - Single-reading deviations from a statistical baseline (spikes, sudden
//!   drops, general outliers) via z-score classification
//! - Physically impossible values indicating sensor failure
//! - Gradual drift of the recent mean away from the historical baseline

mod detector;
mod drift;

pub use detector::AnomalyDetector;
pub use drift::detect_drift;

/// Configuration for anomaly detection thresholds
#[derive(Debug, Clone)]
pub struct AnomalyConfig {
    /// Number of standard deviations before a value is anomalous (3-sigma rule)
    pub z_score_threshold: f64,
    /// Multiplier on the standard deviation for spike / sudden-drop bands
    pub spike_multiplier: f64,
    /// Minimum baseline sample size before z-score classes apply
    pub min_baseline_samples: usize,
    /// Minimum readings in the recent window for drift detection
    pub drift_min_window: usize,
    /// Percent change of the recent mean that counts as drift
    pub drift_threshold_pct: f64,
    /// Percent change that escalates drift severity to high
    pub drift_high_pct: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            z_score_threshold: 3.0,
            spike_multiplier: 2.5,
            min_baseline_samples: 10,
            drift_min_window: 5,
            drift_threshold_pct: 15.0,
            drift_high_pct: 30.0,
        }
    }
}
