//! Pattern extraction from historical reading series
//!
//! Distills a device's history into per-metric statistics and trends plus
//! two series-level flags: stability (low variation relative to the mean)
//! and a daily cycle (values repeat at a 24-step lag).

use crate::baseline::metric_stats;
use crate::models::{Metric, Reading};

/// Series length required before cycle detection is attempted
const MIN_CYCLE_SAMPLES: usize = 48;

/// Slope magnitude beyond which the trend is dampened
const TREND_DAMPING_CUTOFF: f64 = 0.1;

/// Coefficient of variation below which the series counts as stable
const STABILITY_CV: f64 = 0.2;

/// Statistics and trend for one metric's series
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricPattern {
    pub mean: f64,
    pub std_dev: f64,
    /// Per-step trend from an ordinary-least-squares fit, dampened
    pub trend: f64,
}

/// Extracted patterns across all four metrics of a series
#[derive(Debug, Clone, Default)]
pub struct SeriesPattern {
    pub flow: MetricPattern,
    pub ph: MetricPattern,
    pub turbidity: MetricPattern,
    pub tds: MetricPattern,
    /// Low variance relative to the mean across all metrics
    pub is_stable: bool,
    /// Values repeat at the cycle period (daily usage rhythm)
    pub has_cycle: bool,
    /// Steps per cycle when `has_cycle` is set
    pub cycle_period: usize,
}

impl SeriesPattern {
    pub fn metric(&self, metric: Metric) -> &MetricPattern {
        match metric {
            Metric::Flow => &self.flow,
            Metric::Ph => &self.ph,
            Metric::Turbidity => &self.turbidity,
            Metric::Tds => &self.tds,
        }
    }
}

/// Extract patterns from a chronologically ordered reading series
pub fn analyze(readings: &[Reading], cycle_period: usize) -> SeriesPattern {
    if readings.is_empty() {
        return SeriesPattern::default();
    }

    let series =
        |metric: Metric| -> Vec<f64> { readings.iter().map(|r| r.value(metric)).collect() };

    let flow_values = series(Metric::Flow);
    let pattern_for = |values: &[f64]| {
        let stats = metric_stats(values);
        MetricPattern {
            mean: stats.mean,
            std_dev: stats.std_dev,
            trend: dampened_slope(values),
        }
    };

    let flow = pattern_for(&flow_values);
    let ph = pattern_for(&series(Metric::Ph));
    let turbidity = pattern_for(&series(Metric::Turbidity));
    let tds = pattern_for(&series(Metric::Tds));

    let avg_std_dev = (flow.std_dev + ph.std_dev + turbidity.std_dev + tds.std_dev) / 4.0;
    let avg_mean = (flow.mean + ph.mean + turbidity.mean + tds.mean) / 4.0;
    let is_stable = avg_mean > 0.0 && avg_std_dev / avg_mean < STABILITY_CV;

    // Usage rhythm shows up in flow first; that is the series the cycle
    // check runs on
    let has_cycle = detect_cycle(&flow_values, cycle_period);

    SeriesPattern {
        flow,
        ph,
        turbidity,
        tds,
        is_stable,
        has_cycle,
        cycle_period,
    }
}

/// Ordinary-least-squares slope over the index sequence, dampened to keep
/// extreme slopes from running the forecast off into its clamps
fn dampened_slope(values: &[f64]) -> f64 {
    let slope = ols_slope(values);
    if slope.abs() > TREND_DAMPING_CUTOFF {
        slope * 0.5
    } else {
        slope
    }
}

fn ols_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
    }

    let n = n as f64;
    let denom = n * sum_x2 - sum_x * sum_x;
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denom
}

/// Proxy autocorrelation at the cycle lag: the series is cyclic when values
/// one period apart differ less on average than the overall spread
fn detect_cycle(values: &[f64], period: usize) -> bool {
    if values.len() < MIN_CYCLE_SAMPLES || values.len() <= period {
        return false;
    }

    let mut total_diff = 0.0;
    let mut count = 0usize;
    for i in 0..values.len() - period {
        total_diff += (values[i] - values[i + period]).abs();
        count += 1;
    }

    let avg_diff = total_diff / count as f64;
    let stats = metric_stats(values);

    stats.mean > 0.0 && avg_diff < stats.std_dev
}
