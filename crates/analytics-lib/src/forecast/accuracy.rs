//! Forecast accuracy evaluation
//!
//! Matches forecast points against actual readings that arrived later and
//! reports mean absolute error per metric plus a single 0-100 accuracy
//! figure for dashboards.

use crate::models::{AccuracyReport, Metric, Prediction, Reading};

/// Maximum timestamp distance for a prediction/actual match, seconds
const MATCH_WINDOW_SECS: i64 = 5 * 60;

/// Compare predictions with the actual readings that followed
///
/// Each prediction matches the first actual within five minutes. With no
/// matches the report is all zeros. Overall accuracy maps average MAE onto
/// 0-100 (an average error of 10 units or more reads as zero).
pub fn evaluate_accuracy(predictions: &[Prediction], actuals: &[Reading]) -> AccuracyReport {
    if predictions.is_empty() || actuals.is_empty() {
        return AccuracyReport::default();
    }

    let mut matches = 0usize;
    let mut total_error = [0.0_f64; 4];

    for prediction in predictions {
        let matched = actuals.iter().find(|actual| {
            (prediction.timestamp - actual.timestamp)
                .num_seconds()
                .abs()
                <= MATCH_WINDOW_SECS
        });

        if let Some(actual) = matched {
            matches += 1;
            for (slot, &metric) in total_error.iter_mut().zip(Metric::ALL.iter()) {
                *slot += (prediction.value(metric) - actual.value(metric)).abs();
            }
        }
    }

    if matches == 0 {
        return AccuracyReport::default();
    }

    let n = matches as f64;
    let [flow_mae, ph_mae, turbidity_mae, tds_mae] = total_error.map(|e| e / n);
    let avg_error = (flow_mae + ph_mae + turbidity_mae + tds_mae) / 4.0;

    AccuracyReport {
        flow_mae,
        ph_mae,
        turbidity_mae,
        tds_mae,
        matches,
        overall_accuracy: (100.0 - avg_error * 10.0).max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FilterMode;
    use chrono::{Duration, Utc};

    fn prediction_at(offset_hours: i64, flow: f64) -> Prediction {
        Prediction {
            timestamp: Utc::now() + Duration::hours(offset_hours),
            flow,
            ph: 7.0,
            turbidity: 10.0,
            tds: 250.0,
            confidence: 0.9,
            method: "exponential_smoothing_with_trend".to_string(),
        }
    }

    fn actual_at(offset_hours: i64, flow: f64) -> Reading {
        Reading {
            device_id: "filter_main".to_string(),
            timestamp: Utc::now() + Duration::hours(offset_hours),
            mode: FilterMode::Drinking,
            flow,
            ph: 7.0,
            turbidity: 10.0,
            tds: 250.0,
        }
    }

    #[test]
    fn test_perfect_forecast_scores_hundred() {
        let predictions: Vec<Prediction> = (1..=5).map(|i| prediction_at(i, 5.0)).collect();
        let actuals: Vec<Reading> = (1..=5).map(|i| actual_at(i, 5.0)).collect();

        let report = evaluate_accuracy(&predictions, &actuals);
        assert_eq!(report.matches, 5);
        assert_eq!(report.flow_mae, 0.0);
        assert_eq!(report.overall_accuracy, 100.0);
    }

    #[test]
    fn test_error_lowers_accuracy() {
        let predictions: Vec<Prediction> = (1..=4).map(|i| prediction_at(i, 5.0)).collect();
        let actuals: Vec<Reading> = (1..=4).map(|i| actual_at(i, 7.0)).collect();

        let report = evaluate_accuracy(&predictions, &actuals);
        assert_eq!(report.matches, 4);
        assert!((report.flow_mae - 2.0).abs() < 1e-9);
        // Average error 0.5 across four metrics -> 95
        assert!((report.overall_accuracy - 95.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_matches_outside_window() {
        let predictions = vec![prediction_at(1, 5.0)];
        let actuals = vec![actual_at(3, 5.0)];

        let report = evaluate_accuracy(&predictions, &actuals);
        assert_eq!(report.matches, 0);
        assert_eq!(report.overall_accuracy, 0.0);
    }

    #[test]
    fn test_huge_errors_floor_at_zero() {
        let predictions = vec![prediction_at(1, 50.0)];
        let actuals = vec![actual_at(1, 0.0)];

        let report = evaluate_accuracy(&predictions, &actuals);
        assert_eq!(report.overall_accuracy, 0.0);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(evaluate_accuracy(&[], &[]).matches, 0);
    }
}
