//! Statistical baseline calculation
//!
//! Reduces a device's historical readings into per-metric summaries
//! (mean, population standard deviation, min, max) that anomaly detection
//! uses as its reference for "normal".

use crate::models::{Baseline, FilterMode, Metric, MetricStats, Reading};
use chrono::Utc;

/// Configuration for baseline calculation
#[derive(Debug, Clone)]
pub struct BaselineConfig {
    /// Minimum matching readings before a baseline is meaningful
    pub min_samples: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self { min_samples: 10 }
    }
}

/// Computes per-device, per-mode statistical baselines
#[derive(Debug, Clone, Default)]
pub struct BaselineCalculator {
    config: BaselineConfig,
}

impl BaselineCalculator {
    pub fn new(config: BaselineConfig) -> Self {
        Self { config }
    }

    /// Compute a baseline over the readings matching `device_id` and `mode`
    ///
    /// Returns `None` when fewer than the configured minimum match. The
    /// result is fully recomputed from the input set; deterministic for a
    /// given set of readings.
    pub fn calculate(
        &self,
        readings: &[Reading],
        device_id: &str,
        mode: FilterMode,
    ) -> Option<Baseline> {
        let matching: Vec<&Reading> = readings
            .iter()
            .filter(|r| r.device_id == device_id && r.mode == mode)
            .collect();

        if matching.len() < self.config.min_samples {
            return None;
        }

        let stats_for = |metric: Metric| {
            let values: Vec<f64> = matching.iter().map(|r| r.value(metric)).collect();
            metric_stats(&values)
        };

        Some(Baseline {
            device_id: device_id.to_string(),
            mode,
            flow: stats_for(Metric::Flow),
            ph: stats_for(Metric::Ph),
            turbidity: stats_for(Metric::Turbidity),
            tds: stats_for(Metric::Tds),
            sample_size: matching.len(),
            calculated_at: Utc::now(),
        })
    }
}

/// Mean, population standard deviation, min and max of a value series
///
/// Population (not sample-corrected) variance: baselines describe the
/// window itself, not an estimate of a larger population.
pub fn metric_stats(values: &[f64]) -> MetricStats {
    if values.is_empty() {
        return MetricStats::default();
    }

    let n = values.len() as f64;
    let sum: f64 = values.iter().sum();
    let mean = sum / n;

    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    let mut min = values[0];
    let mut max = values[0];
    for &v in values {
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }

    MetricStats {
        mean,
        std_dev: variance.sqrt(),
        min,
        max,
    }
}
