//! Storage abstraction consumed by the analytics service
//!
//! The analytics components never talk to a concrete backend; they read
//! historical data and write derived artifacts through this trait. SQL and
//! other durable backends live behind the same contract in their own
//! crates; the in-memory store here backs tests and single-node runs.

use crate::models::{Anomaly, Baseline, FilterHealth, FilterMode, Reading};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Read/write contract between the analytics engine and storage
///
/// Reads return owned copies: the analytics components hold no references
/// into the store across calls. Writes are best-effort; a failure must not
/// poison later calls.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Full reading history for a device, oldest first
    async fn readings_by_device(&self, device_id: &str) -> Vec<Reading>;

    /// The most recent `limit` readings for a device, oldest first
    async fn recent_readings_by_device(&self, device_id: &str, limit: usize) -> Vec<Reading>;

    /// Devices that have reported at least one reading
    async fn active_devices(&self) -> Vec<String>;

    /// The mode the filtration system is currently operating in
    async fn current_mode(&self) -> FilterMode;

    async fn get_baseline(&self, device_id: &str, mode: FilterMode) -> Option<Baseline>;

    async fn save_baseline(&self, baseline: Baseline) -> Result<()>;

    async fn save_anomaly(&self, anomaly: Anomaly) -> Result<()>;

    async fn save_filter_health(&self, health: FilterHealth) -> Result<()>;
}

/// Lock-guarded in-memory store
///
/// Readings append per device; baselines overwrite per device+mode;
/// anomalies and filter-health reports accumulate as history.
#[derive(Debug, Default)]
pub struct MemoryStore {
    readings: RwLock<HashMap<String, Vec<Reading>>>,
    baselines: RwLock<HashMap<(String, FilterMode), Baseline>>,
    anomalies: RwLock<Vec<Anomaly>>,
    health_history: RwLock<Vec<FilterHealth>>,
    mode: RwLock<FilterMode>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            readings: RwLock::new(HashMap::new()),
            baselines: RwLock::new(HashMap::new()),
            anomalies: RwLock::new(Vec::new()),
            health_history: RwLock::new(Vec::new()),
            mode: RwLock::new(FilterMode::Drinking),
        }
    }

    /// Ingest one reading (called by the ingestion boundary and tests)
    pub async fn add_reading(&self, reading: Reading) {
        let mut readings = self.readings.write().await;
        readings
            .entry(reading.device_id.clone())
            .or_default()
            .push(reading);
    }

    pub async fn set_mode(&self, mode: FilterMode) {
        *self.mode.write().await = mode;
    }

    pub async fn anomaly_count(&self) -> usize {
        self.anomalies.read().await.len()
    }

    pub async fn anomalies(&self) -> Vec<Anomaly> {
        self.anomalies.read().await.clone()
    }

    pub async fn latest_filter_health(&self) -> Option<FilterHealth> {
        self.health_history.read().await.last().cloned()
    }

    pub async fn filter_health_history_len(&self) -> usize {
        self.health_history.read().await.len()
    }
}

#[async_trait]
impl AnalyticsStore for MemoryStore {
    async fn readings_by_device(&self, device_id: &str) -> Vec<Reading> {
        self.readings
            .read()
            .await
            .get(device_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn recent_readings_by_device(&self, device_id: &str, limit: usize) -> Vec<Reading> {
        let readings = self.readings.read().await;
        match readings.get(device_id) {
            Some(all) => {
                let start = all.len().saturating_sub(limit);
                all[start..].to_vec()
            }
            None => Vec::new(),
        }
    }

    async fn active_devices(&self) -> Vec<String> {
        let mut devices: Vec<String> = self.readings.read().await.keys().cloned().collect();
        devices.sort();
        devices
    }

    async fn current_mode(&self) -> FilterMode {
        *self.mode.read().await
    }

    async fn get_baseline(&self, device_id: &str, mode: FilterMode) -> Option<Baseline> {
        self.baselines
            .read()
            .await
            .get(&(device_id.to_string(), mode))
            .cloned()
    }

    async fn save_baseline(&self, baseline: Baseline) -> Result<()> {
        let key = (baseline.device_id.clone(), baseline.mode);
        self.baselines.write().await.insert(key, baseline);
        Ok(())
    }

    async fn save_anomaly(&self, anomaly: Anomaly) -> Result<()> {
        self.anomalies.write().await.push(anomaly);
        Ok(())
    }

    async fn save_filter_health(&self, health: FilterHealth) -> Result<()> {
        self.health_history.write().await.push(health);
        Ok(())
    }
}
