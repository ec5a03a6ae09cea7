//! Time-series forecasting of sensor values
//!
//! Projects a fixed horizon of future readings per device and mode using
//! exponential-smoothing-style iteration: per-step trend, mean reversion
//! toward the historical average, and an optional daily cycle component,
//! with confidence decaying into the future.

mod accuracy;
mod patterns;

pub use accuracy::evaluate_accuracy;
pub use patterns::{analyze, MetricPattern, SeriesPattern};

use crate::error::AnalyticsError;
use crate::models::{FilterMode, Metric, Prediction, Reading};
use chrono::Duration;

/// Label recorded on every forecast point
pub const FORECAST_METHOD: &str = "exponential_smoothing_with_trend";

/// Domain range forecasts are clamped to, per metric
///
/// Turbidity forecasts are held to the 0-100 NTU band of normal operation
/// rather than the 0-1000 sensor limit.
fn forecast_range(metric: Metric) -> (f64, f64) {
    match metric {
        Metric::Flow => (0.0, 50.0),
        Metric::Ph => (0.0, 14.0),
        Metric::Turbidity => (0.0, 100.0),
        Metric::Tds => (0.0, 1000.0),
    }
}

/// Configuration for sensor value forecasting
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    /// Minimum matching historical readings before forecasting
    pub min_historical: usize,
    /// Number of future points to project
    pub horizon: usize,
    /// Fraction pulled toward the historical mean each step
    pub mean_reversion: f64,
    /// Steps per cycle for the daily-rhythm component
    pub cycle_period: usize,
    /// Confidence at the first forecast step
    pub base_confidence: f64,
    /// Per-step confidence decay for stable series
    pub stable_decay: f64,
    /// Per-step confidence decay for unstable series
    pub unstable_decay: f64,
    /// Amplitude of the cycle component in standard deviations
    pub cycle_amplitude: f64,
    /// Gaps sampled when estimating the time step between readings
    pub time_step_samples: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_historical: 50,
            horizon: 24,
            mean_reversion: 0.1,
            cycle_period: 24,
            base_confidence: 0.95,
            stable_decay: 0.03,
            unstable_decay: 0.05,
            cycle_amplitude: 0.3,
            time_step_samples: 10,
        }
    }
}

/// Forecasts near-future sensor values from historical readings
#[derive(Debug, Clone, Default)]
pub struct SensorForecaster {
    config: ForecastConfig,
}

impl SensorForecaster {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Project the configured horizon for one device and mode
    ///
    /// The history slice may contain readings from other devices or modes;
    /// they are filtered out before the minimum-sample check.
    pub fn forecast(
        &self,
        history: &[Reading],
        device_id: &str,
        mode: FilterMode,
    ) -> Result<Vec<Prediction>, AnalyticsError> {
        let filtered: Vec<Reading> = history
            .iter()
            .filter(|r| r.device_id == device_id && r.mode == mode)
            .cloned()
            .collect();

        if filtered.len() < self.config.min_historical {
            return Err(AnalyticsError::InsufficientData {
                needed: self.config.min_historical,
                got: filtered.len(),
            });
        }

        let pattern = analyze(&filtered, self.config.cycle_period);
        Ok(self.generate(&filtered, &pattern))
    }

    fn generate(&self, readings: &[Reading], pattern: &SeriesPattern) -> Vec<Prediction> {
        let last = readings.last().expect("minimum sample check passed");
        let step = self.estimate_time_step(readings);

        let mut values = [last.flow, last.ph, last.turbidity, last.tds];
        let mut predictions = Vec::with_capacity(self.config.horizon);

        for i in 0..self.config.horizon {
            for (slot, &metric) in values.iter_mut().zip(Metric::ALL.iter()) {
                let mp = pattern.metric(metric);
                let mut v = *slot + mp.trend;
                v += (mp.mean - v) * self.config.mean_reversion;

                // The daily rhythm shows up in usage (flow) and the dirt
                // load it carries (turbidity), not in water chemistry
                if pattern.has_cycle
                    && matches!(metric, Metric::Flow | Metric::Turbidity)
                {
                    let phase = 2.0 * std::f64::consts::PI * i as f64
                        / pattern.cycle_period as f64;
                    v += phase.sin() * mp.std_dev * self.config.cycle_amplitude;
                }

                let (lo, hi) = forecast_range(metric);
                *slot = v.clamp(lo, hi);
            }

            predictions.push(Prediction {
                timestamp: last.timestamp + step * (i as i32 + 1),
                flow: round2(values[0]),
                ph: round2(values[1]),
                turbidity: round2(values[2]),
                tds: round2(values[3]),
                confidence: self.confidence(i, pattern.is_stable),
                method: FORECAST_METHOD.to_string(),
            });
        }

        predictions
    }

    /// Average of the first few inter-reading gaps, ignoring outliers over
    /// a day; one hour when nothing usable exists
    fn estimate_time_step(&self, readings: &[Reading]) -> Duration {
        let mut total_secs = 0i64;
        let mut count = 0i64;

        for window in readings
            .windows(2)
            .take(self.config.time_step_samples)
        {
            let gap = (window[1].timestamp - window[0].timestamp).num_seconds();
            if gap > 0 && gap < 24 * 3600 {
                total_secs += gap;
                count += 1;
            }
        }

        if count > 0 {
            Duration::seconds(total_secs / count)
        } else {
            Duration::hours(1)
        }
    }

    /// Confidence decays exponentially with forecast distance, faster and
    /// with an extra haircut for unstable series
    fn confidence(&self, step: usize, is_stable: bool) -> f64 {
        let decay = if is_stable {
            self.config.stable_decay
        } else {
            self.config.unstable_decay
        };

        let mut confidence = self.config.base_confidence * (-decay * step as f64).exp();
        if !is_stable {
            confidence *= 0.9;
        }

        confidence.clamp(0.1, 1.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
