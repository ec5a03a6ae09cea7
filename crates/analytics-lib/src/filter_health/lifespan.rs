//! Remaining-life estimation for the filtration medium
//!
//! Three independent estimators (efficiency degradation, processed water
//! volume, calendar age) each produce a day count which is blended with
//! fixed weights and adjusted by the efficiency trend. Each estimator
//! alone is noisy; blended they tolerate gaps in any one signal.

use super::FilterHealthConfig;
use crate::models::{EfficiencyTrend, Reading};
use chrono::Utc;

/// Readings assumed per day when converting per-reading degradation rates
const READINGS_PER_DAY: f64 = 24.0;

/// Fallback days when efficiency shows no degradation at all
const NO_DEGRADATION_DAYS: f64 = 90.0;

/// Minimum readings for the flow-volume estimator to say anything
const MIN_FLOW_READINGS: usize = 10;

/// Upper bound on the time credited to one reading gap, minutes
const MAX_GAP_MINUTES: f64 = 60.0;

/// Assumed gap when no previous reading exists, minutes
const DEFAULT_GAP_MINUTES: f64 = 15.0;

/// Days until efficiency hits the replacement floor
///
/// The degradation rate is estimated from the first-quarter vs last-quarter
/// efficiency means over the elapsed reading count, converted to per-day at
/// an hourly cadence. No detectable degradation reads as a fixed mid-range
/// estimate rather than infinity.
pub fn efficiency_based_days(
    efficiencies: &[f64],
    current_efficiency: f64,
    config: &FilterHealthConfig,
) -> f64 {
    let max_days = config.max_filter_life_days as f64;

    if current_efficiency < config.min_efficiency {
        return 0.0;
    }

    let quarter = efficiencies.len() / 4;
    if quarter == 0 {
        return NO_DEGRADATION_DAYS.min(max_days);
    }

    let first_quarter: f64 =
        efficiencies[..quarter].iter().sum::<f64>() / quarter as f64;
    let last_quarter: f64 =
        efficiencies[efficiencies.len() - quarter..].iter().sum::<f64>() / quarter as f64;

    let rate_per_reading = (first_quarter - last_quarter) / efficiencies.len() as f64;
    let rate_per_day = rate_per_reading * READINGS_PER_DAY;

    if rate_per_day <= 0.0 {
        return NO_DEGRADATION_DAYS.min(max_days);
    }

    let days = (current_efficiency - config.min_efficiency) / rate_per_day;
    days.clamp(0.0, max_days)
}

/// Days until the volume capacity is exhausted at the observed daily rate
pub fn flow_volume_days(readings: &[Reading], config: &FilterHealthConfig) -> f64 {
    let max_days = config.max_filter_life_days as f64;

    if readings.len() < MIN_FLOW_READINGS {
        return max_days;
    }

    let total_liters = total_volume_liters(readings);
    if total_liters <= 0.0 {
        return max_days;
    }

    let remaining_capacity = config.max_filter_volume_liters - total_liters;
    if remaining_capacity <= 0.0 {
        return 0.0;
    }

    let first = readings.first().expect("length checked above");
    let last = readings.last().expect("length checked above");
    let days_covered = (last.timestamp - first.timestamp).num_seconds() as f64 / 86_400.0;
    if days_covered <= 0.0 {
        return max_days;
    }

    let average_daily_flow = total_liters / days_covered;
    if average_daily_flow <= 0.0 {
        return max_days;
    }

    (remaining_capacity / average_daily_flow).clamp(0.0, max_days)
}

/// Days of nominal filter life left at the current calendar age
pub fn age_based_days(readings: &[Reading], config: &FilterHealthConfig) -> f64 {
    let max_days = config.max_filter_life_days as f64;

    if readings.len() < 2 {
        return max_days;
    }

    (max_days - filter_age_days(readings) as f64).clamp(0.0, max_days)
}

/// Blend the three estimates and apply the trend multiplier
pub fn blend_estimates(
    efficiency_days: f64,
    flow_days: f64,
    age_days: f64,
    trend: EfficiencyTrend,
    config: &FilterHealthConfig,
) -> i64 {
    let weighted = efficiency_days * config.efficiency_weight
        + flow_days * config.flow_weight
        + age_days * config.age_weight;

    let adjusted = match trend {
        EfficiencyTrend::Degrading => weighted * 0.85,
        EfficiencyTrend::Improving => weighted * 1.1,
        EfficiencyTrend::Stable => weighted,
    };

    (adjusted.clamp(0.0, config.max_filter_life_days as f64)) as i64
}

/// Total water volume processed, liters
///
/// Flow is L/min; each reading is credited with the actual gap to the
/// previous reading, clamped so an idle overnight gap is not billed as
/// continuous flow.
pub fn total_volume_liters(readings: &[Reading]) -> f64 {
    let mut total = 0.0;
    for (i, reading) in readings.iter().enumerate() {
        let gap_minutes = if i == 0 {
            DEFAULT_GAP_MINUTES
        } else {
            let gap = (reading.timestamp - readings[i - 1].timestamp).num_seconds() as f64 / 60.0;
            gap.clamp(0.0, MAX_GAP_MINUTES)
        };
        total += reading.flow * gap_minutes;
    }
    total
}

/// Calendar age of the filter, proxied by the oldest reading in the stream
pub fn filter_age_days(readings: &[Reading]) -> i64 {
    let oldest = match readings.iter().map(|r| r.timestamp).min() {
        Some(ts) => ts,
        None => return 0,
    };
    ((Utc::now() - oldest).num_seconds() / 86_400).max(0)
}
