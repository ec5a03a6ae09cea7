//! End-to-end tests of the analytics service over the in-memory store

use analytics_lib::{
    AnalyticsService, AnalyticsStore, FilterMode, MemoryStore, Reading, ServiceConfig,
};
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

fn fast_config() -> ServiceConfig {
    ServiceConfig {
        baseline_interval: Duration::from_millis(50),
        health_interval: Duration::from_millis(50),
        forecast_interval: Duration::from_millis(50),
        health_initial_delay: Duration::ZERO,
        forecast_initial_delay: Duration::ZERO,
        startup_jitter: Duration::ZERO,
        ..ServiceConfig::default()
    }
}

fn reading(device_id: &str, offset_hours: i64, turbidity: f64, tds: f64, ph: f64) -> Reading {
    Reading {
        device_id: device_id.to_string(),
        timestamp: Utc::now() - ChronoDuration::hours(offset_hours),
        mode: FilterMode::Drinking,
        flow: 5.0,
        ph,
        turbidity,
        tds,
    }
}

/// Seed matching pre/post streams: the filter removes most turbidity and
/// TDS and nudges pH toward neutral.
async fn seed_filtration_history(store: &MemoryStore, hours: i64) {
    for i in (0..hours).rev() {
        store
            .add_reading(reading("filter_pre", i, 5.0, 300.0, 7.5))
            .await;
        let mut post = reading("filter_post", i, 1.0, 90.0, 7.1);
        post.timestamp = post.timestamp + ChronoDuration::seconds(10);
        store.add_reading(post).await;
    }
}

#[tokio::test]
async fn lifecycle_is_reentrant() {
    let store = Arc::new(MemoryStore::new());
    let service = AnalyticsService::new(store, fast_config());

    assert!(!service.is_running().await);
    service.start().await;
    service.start().await;
    assert!(service.is_running().await);
    assert!(service.status().await.running);

    service.stop().await;
    assert!(!service.is_running().await);

    // Stopping again, and restarting, both work
    tokio::time::timeout(Duration::from_secs(1), service.stop())
        .await
        .expect("repeated stop hung");
    service.start().await;
    assert!(service.is_running().await);
    service.stop().await;
}

#[tokio::test]
async fn background_tasks_produce_artifacts() {
    let store = Arc::new(MemoryStore::new());
    seed_filtration_history(&store, 60).await;

    let service = AnalyticsService::new(
        Arc::clone(&store) as Arc<dyn AnalyticsStore>,
        fast_config(),
    );
    service.start().await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    service.stop().await;

    // Baselines for both devices in the active mode
    assert!(store
        .get_baseline("filter_pre", FilterMode::Drinking)
        .await
        .is_some());
    assert!(store
        .get_baseline("filter_post", FilterMode::Drinking)
        .await
        .is_some());

    // At least one health analysis ran and was persisted
    let health = store
        .latest_filter_health()
        .await
        .expect("no filter health persisted");
    assert!(health.health_score >= 75.0);
    assert!(!health.maintenance_required);

    // Forecasts were cached for the seeded devices
    let forecast = service
        .latest_forecast("filter_pre", FilterMode::Drinking)
        .await
        .expect("no forecast cached");
    assert_eq!(forecast.len(), 24);
    for pair in forecast.windows(2) {
        assert!(pair[1].confidence <= pair[0].confidence);
    }
}

#[tokio::test]
async fn new_reading_triggers_anomaly_and_forecast_paths() {
    let store = Arc::new(MemoryStore::new());
    seed_filtration_history(&store, 60).await;

    let service = AnalyticsService::new(
        Arc::clone(&store) as Arc<dyn AnalyticsStore>,
        fast_config(),
    );

    // A reading with an impossible pH is flagged even with no baseline
    service
        .process_new_reading(reading("filter_pre", 0, 5.0, 300.0, 15.2))
        .await;

    // The forecast refresh is fire-and-forget; give it a beat to land
    tokio::time::sleep(Duration::from_millis(200)).await;

    let anomalies = store.anomalies().await;
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].device_id, "filter_pre");

    assert!(service
        .latest_forecast("filter_pre", FilterMode::Drinking)
        .await
        .is_some());
}

#[tokio::test]
async fn forecast_accuracy_round_trip() {
    let store = Arc::new(MemoryStore::new());
    seed_filtration_history(&store, 60).await;

    let service = AnalyticsService::new(
        Arc::clone(&store) as Arc<dyn AnalyticsStore>,
        fast_config(),
    );
    service.start().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    service.stop().await;

    let forecast = service
        .latest_forecast("filter_pre", FilterMode::Drinking)
        .await
        .expect("no forecast cached");

    // Feed the forecast back in as the readings that "actually" arrived
    for p in &forecast {
        store
            .add_reading(Reading {
                device_id: "filter_pre".to_string(),
                timestamp: p.timestamp,
                mode: FilterMode::Drinking,
                flow: p.flow,
                ph: p.ph,
                turbidity: p.turbidity,
                tds: p.tds,
            })
            .await;
    }

    let report = service
        .forecast_accuracy("filter_pre", FilterMode::Drinking)
        .await
        .expect("no accuracy report");
    assert_eq!(report.matches, forecast.len());
    assert_eq!(report.overall_accuracy, 100.0);
}

#[tokio::test]
async fn store_failures_do_not_stop_the_service() {
    use analytics_lib::{Anomaly, Baseline, FilterHealth};
    use async_trait::async_trait;

    /// Store whose writes always fail
    struct FailingStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl AnalyticsStore for FailingStore {
        async fn readings_by_device(&self, device_id: &str) -> Vec<Reading> {
            self.inner.readings_by_device(device_id).await
        }
        async fn recent_readings_by_device(&self, device_id: &str, limit: usize) -> Vec<Reading> {
            self.inner.recent_readings_by_device(device_id, limit).await
        }
        async fn active_devices(&self) -> Vec<String> {
            self.inner.active_devices().await
        }
        async fn current_mode(&self) -> FilterMode {
            self.inner.current_mode().await
        }
        async fn get_baseline(&self, device_id: &str, mode: FilterMode) -> Option<Baseline> {
            self.inner.get_baseline(device_id, mode).await
        }
        async fn save_baseline(&self, _baseline: Baseline) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
        async fn save_anomaly(&self, _anomaly: Anomaly) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
        async fn save_filter_health(&self, _health: FilterHealth) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    let failing = Arc::new(FailingStore {
        inner: MemoryStore::new(),
    });
    seed_filtration_history(&failing.inner, 60).await;

    let service = AnalyticsService::new(
        Arc::clone(&failing) as Arc<dyn AnalyticsStore>,
        fast_config(),
    );
    service.start().await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Still running, still forecasting (forecasts bypass the failing writes)
    assert!(service.is_running().await);
    assert!(service
        .latest_forecast("filter_pre", FilterMode::Drinking)
        .await
        .is_some());

    service.stop().await;
}
