//! Core data models for the filtration analytics engine

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating mode of the filtration system
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Drinking,
    Household,
}

impl FilterMode {
    pub const ALL: [FilterMode; 2] = [FilterMode::Drinking, FilterMode::Household];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMode::Drinking => "drinking",
            FilterMode::Household => "household",
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the four sensor metrics carried by every reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Flow,
    Ph,
    Turbidity,
    Tds,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Flow, Metric::Ph, Metric::Turbidity, Metric::Tds];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Flow => "flow",
            Metric::Ph => "ph",
            Metric::Turbidity => "turbidity",
            Metric::Tds => "tds",
        }
    }

    /// Physically possible sensor range; values outside it indicate a
    /// failed or disconnected sensor rather than bad water.
    pub fn physical_range(&self) -> (f64, f64) {
        match self {
            Metric::Flow => (0.0, 50.0),
            Metric::Ph => (0.0, 14.0),
            Metric::Turbidity => (0.0, 1000.0),
            Metric::Tds => (0.0, 1000.0),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single multi-metric sensor reading from a filtration device
///
/// Flow is L/min, turbidity is NTU, TDS is PPM. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub mode: FilterMode,
    pub flow: f64,
    pub ph: f64,
    pub turbidity: f64,
    pub tds: f64,
}

impl Reading {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Flow => self.flow,
            Metric::Ph => self.ph,
            Metric::Turbidity => self.turbidity,
            Metric::Tds => self.tds,
        }
    }

    /// Device placement relative to the filtration medium, by id convention
    pub fn is_pre_filtration(&self) -> bool {
        self.device_id.to_lowercase().contains("pre")
    }

    pub fn is_post_filtration(&self) -> bool {
        self.device_id.to_lowercase().contains("post")
    }

    /// Check every metric against its physical sensor range
    pub fn validate(&self) -> bool {
        Metric::ALL.iter().all(|m| {
            let (lo, hi) = m.physical_range();
            let v = self.value(*m);
            v >= lo && v <= hi
        })
    }
}

/// Statistical summary of one metric over a historical window
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// Per-device, per-mode statistical baseline describing "normal"
///
/// Always recomputed wholesale from a historical window, never updated
/// incrementally. Meaningful only when `sample_size >= 10`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    pub device_id: String,
    pub mode: FilterMode,
    pub flow: MetricStats,
    pub ph: MetricStats,
    pub turbidity: MetricStats,
    pub tds: MetricStats,
    pub sample_size: usize,
    pub calculated_at: DateTime<Utc>,
}

impl Baseline {
    pub fn stats(&self, metric: Metric) -> &MetricStats {
        match metric {
            Metric::Flow => &self.flow,
            Metric::Ph => &self.ph,
            Metric::Turbidity => &self.turbidity,
            Metric::Tds => &self.tds,
        }
    }
}

/// Kind of anomaly detected in a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    Spike,
    SuddenDrop,
    Outlier,
    SensorFailure,
    Drift,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::Spike => "spike",
            AnomalyType::SuddenDrop => "sudden_drop",
            AnomalyType::Outlier => "outlier",
            AnomalyType::SensorFailure => "sensor_failure",
            AnomalyType::Drift => "drift",
        }
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anomaly severity, ordered from least to most serious
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected deviation from normal sensor behavior
///
/// Never deleted; external resolution and false-positive actions only flag
/// the record after the fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub device_id: String,
    pub mode: FilterMode,
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub affected_metric: Metric,
    pub expected_value: f64,
    pub actual_value: f64,
    /// Percentage deviation from the expected value
    pub deviation_pct: f64,
    pub description: String,
    pub detected_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    pub is_false_positive: bool,
    pub alert_sent: bool,
    pub auto_resolved: bool,
}

impl Anomaly {
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    pub fn is_stale(&self, max_age: Duration) -> bool {
        Utc::now() - self.detected_at > max_age
    }
}

/// Direction the filter's efficiency is moving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EfficiencyTrend {
    Improving,
    Stable,
    Degrading,
}

impl EfficiencyTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            EfficiencyTrend::Improving => "improving",
            EfficiencyTrend::Stable => "stable",
            EfficiencyTrend::Degrading => "degrading",
        }
    }
}

impl fmt::Display for EfficiencyTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health assessment and remaining-life prediction for the filtration medium
///
/// Recomputed wholesale on each analysis run; prior records are history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterHealth {
    pub device_id: String,
    pub mode: FilterMode,
    /// 0-100, 100 = excellent
    pub health_score: f64,
    pub current_efficiency: f64,
    pub average_efficiency: f64,
    pub efficiency_trend: EfficiencyTrend,
    /// Percent reduction pre to post
    pub turbidity_reduction_pct: f64,
    pub tds_reduction_pct: f64,
    /// How well pH is pulled toward neutral
    pub ph_stabilization_pct: f64,
    /// Total water volume processed, liters
    pub total_flow_processed: f64,
    pub filter_age_days: i64,
    pub predicted_days_remaining: i64,
    pub estimated_replacement: DateTime<Utc>,
    pub maintenance_required: bool,
    pub replacement_urgent: bool,
    pub recommendations: Vec<String>,
    pub last_calculated: DateTime<Utc>,
}

impl FilterHealth {
    pub fn health_category(&self) -> &'static str {
        match self.health_score {
            s if s >= 90.0 => "excellent",
            s if s >= 75.0 => "good",
            s if s >= 50.0 => "fair",
            s if s >= 25.0 => "poor",
            _ => "critical",
        }
    }

    pub fn needs_attention(&self) -> bool {
        self.health_score < 50.0 || self.predicted_days_remaining < 7 || self.replacement_urgent
    }
}

/// One forecast point for a device's sensor values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub timestamp: DateTime<Utc>,
    pub flow: f64,
    pub ph: f64,
    pub turbidity: f64,
    pub tds: f64,
    /// 0-1, decays with forecast distance
    pub confidence: f64,
    pub method: String,
}

impl Prediction {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Flow => self.flow,
            Metric::Ph => self.ph,
            Metric::Turbidity => self.turbidity,
            Metric::Tds => self.tds,
        }
    }
}

/// Forecast accuracy against later actual readings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccuracyReport {
    pub flow_mae: f64,
    pub ph_mae: f64,
    pub turbidity_mae: f64,
    pub tds_mae: f64,
    pub matches: usize,
    /// 0-100, derived from the average MAE across metrics
    pub overall_accuracy: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(ph: f64, turbidity: f64) -> Reading {
        Reading {
            device_id: "filter_pre".to_string(),
            timestamp: Utc::now(),
            mode: FilterMode::Drinking,
            flow: 5.0,
            ph,
            turbidity,
            tds: 200.0,
        }
    }

    #[test]
    fn test_reading_validate_ranges() {
        assert!(reading(7.0, 10.0).validate());
        assert!(!reading(15.2, 10.0).validate());
        assert!(!reading(7.0, 1500.0).validate());
    }

    #[test]
    fn test_device_type_from_id() {
        let r = reading(7.0, 10.0);
        assert!(r.is_pre_filtration());
        assert!(!r.is_post_filtration());
    }

    #[test]
    fn test_enum_wire_casing() {
        assert_eq!(
            serde_json::to_string(&AnomalyType::SuddenDrop).unwrap(),
            "\"sudden_drop\""
        );
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"critical\"");
        assert_eq!(
            serde_json::to_string(&FilterMode::Household).unwrap(),
            "\"household\""
        );
        assert_eq!(serde_json::to_string(&Metric::Tds).unwrap(), "\"tds\"");
    }

    #[test]
    fn test_reading_round_trips_through_json() {
        let original = reading(7.2, 12.5);
        let json = serde_json::to_string(&original).unwrap();
        let decoded: Reading = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.device_id, original.device_id);
        assert_eq!(decoded.ph, original.ph);
        assert_eq!(decoded.mode, original.mode);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(Severity::Critical.level(), 4);
    }

    #[test]
    fn test_health_category_boundaries() {
        let mut health = FilterHealth {
            device_id: "filter_system".to_string(),
            mode: FilterMode::Drinking,
            health_score: 92.0,
            current_efficiency: 80.0,
            average_efficiency: 80.0,
            efficiency_trend: EfficiencyTrend::Stable,
            turbidity_reduction_pct: 80.0,
            tds_reduction_pct: 70.0,
            ph_stabilization_pct: 50.0,
            total_flow_processed: 1000.0,
            filter_age_days: 10,
            predicted_days_remaining: 120,
            estimated_replacement: Utc::now(),
            maintenance_required: false,
            replacement_urgent: false,
            recommendations: vec![],
            last_calculated: Utc::now(),
        };
        assert_eq!(health.health_category(), "excellent");
        health.health_score = 75.0;
        assert_eq!(health.health_category(), "good");
        health.health_score = 49.9;
        assert_eq!(health.health_category(), "poor");
        health.health_score = 10.0;
        assert_eq!(health.health_category(), "critical");
    }
}
