//! Filtration efficiency metrics
//!
//! Efficiency of a single pass is a weighted blend of how much the filter
//! reduced turbidity and TDS and how much it pulled pH toward neutral.
//! Turbidity and TDS carry most of the weight; pH centering matters less.

use super::pairing::ReadingPair;
use crate::models::{EfficiencyTrend, Metric};
use tracing::warn;

const TURBIDITY_WEIGHT: f64 = 0.4;
const TDS_WEIGHT: f64 = 0.4;
const PH_WEIGHT: f64 = 0.2;

/// Neutral pH that filtration should pull toward
const TARGET_PH: f64 = 7.0;

/// Relative change (percent) beyond which a trend is no longer "stable"
const TREND_CHANGE_PCT: f64 = 5.0;

/// Efficiency of one filtration pass, 0-100
pub fn pair_efficiency(pair: &ReadingPair) -> f64 {
    let turbidity_improvement = if pair.pre.turbidity > 0.0 {
        (pair.pre.turbidity - pair.post.turbidity) / pair.pre.turbidity * 100.0
    } else {
        0.0
    };

    let tds_improvement = if pair.pre.tds > 0.0 {
        (pair.pre.tds - pair.post.tds) / pair.pre.tds * 100.0
    } else {
        0.0
    };

    let pre_ph_deviation = (pair.pre.ph - TARGET_PH).abs();
    let post_ph_deviation = (pair.post.ph - TARGET_PH).abs();
    let ph_improvement = if pre_ph_deviation > 0.0 {
        (pre_ph_deviation - post_ph_deviation) / pre_ph_deviation * 100.0
    } else {
        0.0
    };

    let efficiency = turbidity_improvement * TURBIDITY_WEIGHT
        + tds_improvement * TDS_WEIGHT
        + ph_improvement * PH_WEIGHT;

    efficiency.clamp(0.0, 100.0)
}

/// Average reduction percentage for turbidity or TDS across pairs
///
/// Counts only realistic reductions in (0, 100]. Negative reductions mean
/// the post value exceeded the pre value (contaminated filter or swapped
/// sensors); when more than half the pairs show that, the aggregate is 0.
pub fn average_reduction(pairs: &[ReadingPair], metric: Metric) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }

    let mut total = 0.0;
    let mut count = 0usize;
    let mut negative_count = 0usize;

    for pair in pairs {
        let (pre_value, post_value) = (pair.pre.value(metric), pair.post.value(metric));
        if pre_value <= 0.0 || post_value < 0.0 {
            continue;
        }

        let reduction = (pre_value - post_value) / pre_value * 100.0;
        if reduction > 0.0 && reduction <= 100.0 {
            total += reduction;
            count += 1;
        } else if reduction < 0.0 {
            negative_count += 1;
            warn!(
                metric = %metric,
                reduction_pct = reduction,
                pre = pre_value,
                post = post_value,
                "Negative reduction, filter may be contaminated or sensors swapped"
            );
        }
    }

    if negative_count > pairs.len() / 2 {
        warn!(
            metric = %metric,
            "Majority of readings show negative reduction, check sensor placement and filter condition"
        );
        return 0.0;
    }

    if count == 0 {
        return 0.0;
    }

    (total / count as f64).max(0.0)
}

/// Average improvement in pH distance to neutral across pairs, 0-100
pub fn ph_stabilization(pairs: &[ReadingPair]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }

    let mut total = 0.0;
    let mut count = 0usize;

    for pair in pairs {
        let pre_deviation = (pair.pre.ph - TARGET_PH).abs();
        if pre_deviation <= 0.0 {
            continue;
        }
        let post_deviation = (pair.post.ph - TARGET_PH).abs();
        let improvement = (pre_deviation - post_deviation) / pre_deviation * 100.0;
        if improvement > 0.0 && improvement <= 100.0 {
            total += improvement;
            count += 1;
        }
    }

    if count == 0 {
        return 0.0;
    }

    (total / count as f64).max(0.0)
}

/// Direction the efficiency sequence is moving
///
/// Splits the sequence at its midpoint and compares half means; short
/// sequences (under 10 points) read as stable.
pub fn detect_trend(efficiencies: &[f64]) -> EfficiencyTrend {
    if efficiencies.len() < 10 {
        return EfficiencyTrend::Stable;
    }

    let mid = efficiencies.len() / 2;
    let first_avg = mean(&efficiencies[..mid]);
    let second_avg = mean(&efficiencies[mid..]);

    if first_avg == 0.0 {
        return EfficiencyTrend::Stable;
    }

    let change_pct = (second_avg - first_avg) / first_avg * 100.0;
    if change_pct > TREND_CHANGE_PCT {
        EfficiencyTrend::Improving
    } else if change_pct < -TREND_CHANGE_PCT {
        EfficiencyTrend::Degrading
    } else {
        EfficiencyTrend::Stable
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean of the last `n` values (all of them when fewer exist)
pub fn recent_average(values: &[f64], n: usize) -> f64 {
    let start = values.len().saturating_sub(n);
    mean(&values[start..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilterMode, Reading};
    use chrono::Utc;

    fn pair(
        pre_turbidity: f64,
        post_turbidity: f64,
        pre_tds: f64,
        post_tds: f64,
        pre_ph: f64,
        post_ph: f64,
    ) -> ReadingPair {
        let make = |device_id: &str, turbidity: f64, tds: f64, ph: f64| Reading {
            device_id: device_id.to_string(),
            timestamp: Utc::now(),
            mode: FilterMode::Drinking,
            flow: 5.0,
            ph,
            turbidity,
            tds,
        };
        ReadingPair {
            pre: make("filter_pre", pre_turbidity, pre_tds, pre_ph),
            post: make("filter_post", post_turbidity, post_tds, post_ph),
        }
    }

    #[test]
    fn test_pair_efficiency_weighting() {
        // 80% turbidity, 70% tds, 80% ph improvement
        let p = pair(5.0, 1.0, 300.0, 90.0, 7.5, 7.1);
        let eff = pair_efficiency(&p);
        assert!((eff - 76.0).abs() < 0.01, "efficiency was {}", eff);
    }

    #[test]
    fn test_pair_efficiency_clamped() {
        // Post values worse than pre: raw blend is negative
        let p = pair(5.0, 10.0, 300.0, 600.0, 7.0, 9.0);
        assert_eq!(pair_efficiency(&p), 0.0);
    }

    #[test]
    fn test_pair_efficiency_zero_pre_values() {
        let p = pair(0.0, 0.0, 0.0, 0.0, 7.0, 7.0);
        assert_eq!(pair_efficiency(&p), 0.0);
    }

    #[test]
    fn test_average_reduction() {
        let pairs = vec![
            pair(5.0, 1.0, 300.0, 90.0, 7.0, 7.0),
            pair(4.0, 0.8, 280.0, 84.0, 7.0, 7.0),
        ];
        let turbidity = average_reduction(&pairs, Metric::Turbidity);
        assert!((turbidity - 80.0).abs() < 0.01);
        let tds = average_reduction(&pairs, Metric::Tds);
        assert!((tds - 70.0).abs() < 0.01);
    }

    #[test]
    fn test_majority_negative_reductions_zero_out() {
        let pairs = vec![
            pair(5.0, 8.0, 300.0, 90.0, 7.0, 7.0),
            pair(5.0, 9.0, 300.0, 90.0, 7.0, 7.0),
            pair(5.0, 1.0, 300.0, 90.0, 7.0, 7.0),
        ];
        assert_eq!(average_reduction(&pairs, Metric::Turbidity), 0.0);
        // TDS is unaffected by the turbidity sensor trouble
        assert!((average_reduction(&pairs, Metric::Tds) - 70.0).abs() < 0.01);
    }

    #[test]
    fn test_ph_stabilization() {
        let pairs = vec![pair(5.0, 1.0, 300.0, 90.0, 8.0, 7.2)];
        // deviation 1.0 -> 0.2 is an 80% improvement
        assert!((ph_stabilization(&pairs) - 80.0).abs() < 0.01);
    }

    #[test]
    fn test_ph_stabilization_ignores_neutral_pre() {
        let pairs = vec![pair(5.0, 1.0, 300.0, 90.0, 7.0, 7.0)];
        assert_eq!(ph_stabilization(&pairs), 0.0);
    }

    #[test]
    fn test_trend_short_sequence_is_stable() {
        assert_eq!(detect_trend(&[80.0; 9]), EfficiencyTrend::Stable);
    }

    #[test]
    fn test_trend_detection() {
        let mut improving: Vec<f64> = vec![60.0; 10];
        improving.extend(vec![70.0; 10]);
        assert_eq!(detect_trend(&improving), EfficiencyTrend::Improving);

        let mut degrading: Vec<f64> = vec![70.0; 10];
        degrading.extend(vec![60.0; 10]);
        assert_eq!(detect_trend(&degrading), EfficiencyTrend::Degrading);

        assert_eq!(detect_trend(&[65.0; 20]), EfficiencyTrend::Stable);
    }

    #[test]
    fn test_recent_average() {
        let values = vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0];
        assert!((recent_average(&values, 5) - 40.0).abs() < 1e-9);
        assert!((recent_average(&values, 100) - 35.0).abs() < 1e-9);
    }
}
