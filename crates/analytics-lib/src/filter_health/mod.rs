//! Filter health assessment and lifespan prediction
//!
//! Pairs pre/post-filtration readings, derives per-pass efficiency and its
//! trend, scores overall health, blends three remaining-life estimators and
//! emits actionable recommendations.

mod efficiency;
mod lifespan;
mod pairing;

pub use efficiency::{detect_trend, pair_efficiency};
pub use pairing::{match_readings, ReadingPair};

use crate::error::AnalyticsError;
use crate::models::{EfficiencyTrend, FilterHealth, FilterMode, Metric, Reading};
use chrono::{Duration, Utc};

/// Configuration for filter health analysis
#[derive(Debug, Clone)]
pub struct FilterHealthConfig {
    /// Identifier recorded on emitted health reports
    pub system_id: String,
    /// Minimum readings required in each of the pre and post streams
    pub min_data_points: usize,
    /// Maximum timestamp distance for a pre/post pair, seconds
    pub pair_window_secs: i64,
    /// Pair-efficiency samples that define "current" efficiency
    pub recent_window: usize,
    /// Efficiency floor below which the filter is due for replacement
    pub min_efficiency: f64,
    /// Nominal maximum filter lifespan, days
    pub max_filter_life_days: i64,
    /// Volume capacity before replacement, liters
    pub max_filter_volume_liters: f64,
    /// Blend weights for the three lifespan estimators
    pub efficiency_weight: f64,
    pub flow_weight: f64,
    pub age_weight: f64,
}

impl Default for FilterHealthConfig {
    fn default() -> Self {
        Self {
            system_id: "filter_system".to_string(),
            min_data_points: 20,
            pair_window_secs: 60,
            recent_window: 5,
            min_efficiency: 30.0,
            max_filter_life_days: 180,
            max_filter_volume_liters: 100_000.0,
            efficiency_weight: 0.5,
            flow_weight: 0.3,
            age_weight: 0.2,
        }
    }
}

/// Analyzes filter health from paired pre/post-filtration readings
#[derive(Debug, Clone, Default)]
pub struct FilterHealthAnalyzer {
    config: FilterHealthConfig,
}

impl FilterHealthAnalyzer {
    pub fn new(config: FilterHealthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FilterHealthConfig {
        &self.config
    }

    /// Run a full health analysis over the two reading streams
    pub fn analyze(
        &self,
        pre_readings: &[Reading],
        post_readings: &[Reading],
        mode: FilterMode,
    ) -> Result<FilterHealth, AnalyticsError> {
        let min = self.config.min_data_points;
        let got = pre_readings.len().min(post_readings.len());
        if pre_readings.len() < min || post_readings.len() < min {
            return Err(AnalyticsError::InsufficientData { needed: min, got });
        }

        let pairs = match_readings(pre_readings, post_readings, self.config.pair_window_secs);
        if pairs.len() < min / 2 {
            return Err(AnalyticsError::InsufficientPairs {
                needed: min / 2,
                got: pairs.len(),
            });
        }

        let efficiencies: Vec<f64> = pairs.iter().map(pair_efficiency).collect();
        let current_efficiency =
            efficiency::recent_average(&efficiencies, self.config.recent_window);
        let average_efficiency = efficiency::mean(&efficiencies);
        let trend = detect_trend(&efficiencies);

        let turbidity_reduction = efficiency::average_reduction(&pairs, Metric::Turbidity);
        let tds_reduction = efficiency::average_reduction(&pairs, Metric::Tds);
        let ph_stabilization = efficiency::ph_stabilization(&pairs);

        let health_score = self.health_score(
            current_efficiency,
            average_efficiency,
            turbidity_reduction,
            tds_reduction,
            trend,
        );

        let efficiency_days =
            lifespan::efficiency_based_days(&efficiencies, current_efficiency, &self.config);
        let flow_days = lifespan::flow_volume_days(pre_readings, &self.config);
        let age_days = lifespan::age_based_days(pre_readings, &self.config);
        let days_remaining =
            lifespan::blend_estimates(efficiency_days, flow_days, age_days, trend, &self.config);

        let maintenance_required = health_score < 75.0;
        let replacement_urgent = health_score < 30.0 || days_remaining < 7;

        let recommendations =
            self.recommendations(health_score, current_efficiency, days_remaining, trend);

        let now = Utc::now();
        Ok(FilterHealth {
            device_id: self.config.system_id.clone(),
            mode,
            health_score,
            current_efficiency,
            average_efficiency,
            efficiency_trend: trend,
            turbidity_reduction_pct: turbidity_reduction,
            tds_reduction_pct: tds_reduction,
            ph_stabilization_pct: ph_stabilization,
            total_flow_processed: lifespan::total_volume_liters(pre_readings),
            filter_age_days: lifespan::filter_age_days(pre_readings),
            predicted_days_remaining: days_remaining,
            estimated_replacement: now + Duration::days(days_remaining),
            maintenance_required,
            replacement_urgent,
            recommendations,
            last_calculated: now,
        })
    }

    /// Overall health score, 0-100
    ///
    /// Starts from current efficiency and applies fixed adjustments for
    /// average performance, per-metric reductions and the trend.
    fn health_score(
        &self,
        current_efficiency: f64,
        average_efficiency: f64,
        turbidity_reduction: f64,
        tds_reduction: f64,
        trend: EfficiencyTrend,
    ) -> f64 {
        let mut score = current_efficiency;

        if average_efficiency > 70.0 {
            score += 5.0;
        } else if average_efficiency < 50.0 {
            score -= 10.0;
        }

        if turbidity_reduction > 80.0 {
            score += 5.0;
        } else if turbidity_reduction < 40.0 {
            score -= 10.0;
        }

        if tds_reduction > 70.0 {
            score += 5.0;
        } else if tds_reduction < 30.0 {
            score -= 10.0;
        }

        match trend {
            EfficiencyTrend::Improving => score += 10.0,
            EfficiencyTrend::Degrading => score -= 15.0,
            EfficiencyTrend::Stable => {}
        }

        score.clamp(0.0, 100.0)
    }

    /// Ordered, rule-based maintenance recommendations
    fn recommendations(
        &self,
        health_score: f64,
        current_efficiency: f64,
        days_remaining: i64,
        trend: EfficiencyTrend,
    ) -> Vec<String> {
        let mut recommendations = Vec::new();

        if health_score < 30.0 {
            recommendations.push("URGENT: Replace filter immediately".to_string());
            recommendations.push("Filter efficiency critically low".to_string());
        } else if health_score < 50.0 {
            recommendations.push("Schedule filter replacement soon".to_string());
            recommendations.push("Monitor water quality closely".to_string());
        } else if health_score < 75.0 {
            recommendations.push("Perform filter maintenance check".to_string());
            recommendations.push("Consider cleaning pre-filters".to_string());
        } else {
            recommendations.push("Filter operating normally".to_string());
        }

        if current_efficiency < 40.0 {
            recommendations.push("Current efficiency below optimal levels".to_string());
        }

        if days_remaining <= 7 {
            recommendations.push(format!(
                "Only {days_remaining} days until replacement recommended"
            ));
        } else if days_remaining <= 30 {
            recommendations.push(format!(
                "Plan filter replacement within {days_remaining} days"
            ));
        }

        match trend {
            EfficiencyTrend::Degrading => recommendations
                .push("Filter performance is declining - monitor regularly".to_string()),
            EfficiencyTrend::Improving => {
                recommendations.push("Filter performance is stable or improving".to_string())
            }
            EfficiencyTrend::Stable => {}
        }

        recommendations
    }
}
