//! Analytics service orchestration
//!
//! Owns the timers. Three periodic background tasks (baseline refresh plus
//! drift sweep, filter health analysis, forecast refresh) each run on their
//! own interval with a staggered, jittered initial delay so they do not
//! contend for the same history on startup. A new reading can additionally
//! trigger an out-of-band forecast refresh for just that device and mode,
//! dispatched fire-and-forget off the ingestion path.
//!
//! `start` and `stop` are reentrant. Shutdown is a broadcast channel every
//! task subscribes to, and `stop` awaits every task handle before
//! returning, so calling it twice (or from two places) cannot hang.

use crate::anomaly::{detect_drift, AnomalyDetector};
use crate::baseline::BaselineCalculator;
use crate::filter_health::FilterHealthAnalyzer;
use crate::forecast::{evaluate_accuracy, SensorForecaster};
use crate::health::{components, HealthRegistry};
use crate::models::{AccuracyReport, FilterMode, Prediction, Reading};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::store::AnalyticsStore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Configuration for the service's background scheduling
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Interval between baseline recomputations (and drift sweeps)
    pub baseline_interval: Duration,
    /// Interval between filter health analyses
    pub health_interval: Duration,
    /// Interval between full forecast refreshes
    pub forecast_interval: Duration,
    /// Initial delay before the first health analysis
    pub health_initial_delay: Duration,
    /// Initial delay before the first forecast refresh
    pub forecast_initial_delay: Duration,
    /// Maximum random jitter added to every initial delay
    pub startup_jitter: Duration,
    /// Device id of the pre-filtration sensor bank
    pub pre_device: String,
    /// Device id of the post-filtration sensor bank
    pub post_device: String,
    /// Readings pulled per stream for health analysis
    pub stream_limit: usize,
    /// Readings pulled per device for forecasting
    pub history_limit: usize,
    /// Readings in the recent window for drift detection
    pub drift_window: usize,
    /// Run anomaly detection on every incoming reading
    pub realtime_anomaly: bool,
    /// Refresh the forecast when a new reading arrives
    pub auto_forecast: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            baseline_interval: Duration::from_secs(60 * 60),
            health_interval: Duration::from_secs(30 * 60),
            forecast_interval: Duration::from_secs(2 * 60 * 60),
            health_initial_delay: Duration::from_secs(5 * 60),
            forecast_initial_delay: Duration::from_secs(10 * 60),
            startup_jitter: Duration::from_secs(30),
            pre_device: "filter_pre".to_string(),
            post_device: "filter_post".to_string(),
            stream_limit: 100,
            history_limit: 200,
            drift_window: 20,
            realtime_anomaly: true,
            auto_forecast: true,
        }
    }
}

/// Snapshot of the service's run state and configuration
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub baseline_interval_secs: u64,
    pub health_interval_secs: u64,
    pub forecast_interval_secs: u64,
    pub realtime_anomaly: bool,
    pub auto_forecast: bool,
}

/// Handles held while the background tasks are alive
struct RunningState {
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

/// Shared state the background tasks operate on
struct ServiceInner {
    store: Arc<dyn AnalyticsStore>,
    config: ServiceConfig,
    baseline_calculator: BaselineCalculator,
    anomaly_detector: AnomalyDetector,
    health_analyzer: FilterHealthAnalyzer,
    forecaster: SensorForecaster,
    registry: HealthRegistry,
    metrics: EngineMetrics,
    logger: StructuredLogger,
    /// Latest forecast horizon per device and mode; each refresh replaces
    /// the previous run wholesale
    forecasts: RwLock<HashMap<(String, FilterMode), Vec<Prediction>>>,
}

/// Orchestrates the analytics components over a storage backend
pub struct AnalyticsService {
    inner: Arc<ServiceInner>,
    state: Mutex<Option<RunningState>>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn AnalyticsStore>, config: ServiceConfig) -> Self {
        let health_analyzer = FilterHealthAnalyzer::default();
        let system_id = health_analyzer.config().system_id.clone();
        Self {
            inner: Arc::new(ServiceInner {
                store,
                config,
                baseline_calculator: BaselineCalculator::default(),
                anomaly_detector: AnomalyDetector::default(),
                health_analyzer,
                forecaster: SensorForecaster::default(),
                registry: HealthRegistry::new(),
                metrics: EngineMetrics::new(),
                logger: StructuredLogger::new(system_id),
                forecasts: RwLock::new(HashMap::new()),
            }),
            state: Mutex::new(None),
        }
    }

    /// Spawn the background tasks; no-op when already running
    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        if state.is_some() {
            debug!("Analytics service already running");
            return;
        }

        let registry = &self.inner.registry;
        registry.register(components::BASELINE).await;
        registry.register(components::FILTER_HEALTH).await;
        registry.register(components::FORECAST).await;

        let (shutdown_tx, _) = broadcast::channel(1);
        let tasks = vec![
            tokio::spawn(baseline_task(
                Arc::clone(&self.inner),
                shutdown_tx.subscribe(),
            )),
            tokio::spawn(filter_health_task(
                Arc::clone(&self.inner),
                shutdown_tx.subscribe(),
            )),
            tokio::spawn(forecast_task(
                Arc::clone(&self.inner),
                shutdown_tx.subscribe(),
            )),
        ];

        *state = Some(RunningState { shutdown_tx, tasks });
        self.inner.logger.log_startup(env!("CARGO_PKG_VERSION"));
    }

    /// Signal every background task and wait for all of them to exit;
    /// no-op when not running
    pub async fn stop(&self) {
        let running = {
            let mut state = self.state.lock().await;
            match state.take() {
                Some(running) => running,
                None => {
                    debug!("Analytics service not running");
                    return;
                }
            }
        };

        let _ = running.shutdown_tx.send(());
        for task in running.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task panicked during shutdown");
            }
        }
        self.inner.logger.log_shutdown("stop requested");
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_some()
    }

    pub async fn status(&self) -> ServiceStatus {
        ServiceStatus {
            running: self.is_running().await,
            baseline_interval_secs: self.inner.config.baseline_interval.as_secs(),
            health_interval_secs: self.inner.config.health_interval.as_secs(),
            forecast_interval_secs: self.inner.config.forecast_interval.as_secs(),
            realtime_anomaly: self.inner.config.realtime_anomaly,
            auto_forecast: self.inner.config.auto_forecast,
        }
    }

    pub fn health_registry(&self) -> &HealthRegistry {
        &self.inner.registry
    }

    /// Handle a freshly ingested reading
    ///
    /// Runs anomaly detection inline (cheap, a handful of comparisons) and
    /// dispatches the forecast refresh asynchronously so the ingestion path
    /// never waits on it.
    pub async fn process_new_reading(&self, reading: Reading) {
        if self.inner.config.realtime_anomaly {
            self.inner.detect_and_save_anomalies(&reading).await;
        }

        if self.inner.config.auto_forecast {
            let inner = Arc::clone(&self.inner);
            let device_id = reading.device_id.clone();
            let mode = reading.mode;
            tokio::spawn(async move {
                inner.refresh_forecast(&device_id, mode, "new_reading").await;
            });
        }
    }

    /// The latest forecast horizon for a device and mode, if one exists
    pub async fn latest_forecast(
        &self,
        device_id: &str,
        mode: FilterMode,
    ) -> Option<Vec<Prediction>> {
        self.inner
            .forecasts
            .read()
            .await
            .get(&(device_id.to_string(), mode))
            .cloned()
    }

    /// Score the cached forecast against the readings that arrived since
    pub async fn forecast_accuracy(
        &self,
        device_id: &str,
        mode: FilterMode,
    ) -> Option<AccuracyReport> {
        let predictions = self.latest_forecast(device_id, mode).await?;
        let actuals = self
            .inner
            .store
            .recent_readings_by_device(device_id, self.inner.config.history_limit)
            .await;
        Some(evaluate_accuracy(&predictions, &actuals))
    }
}

impl ServiceInner {
    /// Recompute baselines for every device and mode, then sweep for drift
    async fn refresh_baselines(&self) {
        let start = Instant::now();
        let devices = self.store.active_devices().await;
        self.metrics.set_devices_monitored(devices.len() as i64);

        let mut updated = 0usize;
        let mut store_down = false;

        for device in &devices {
            let readings = self.store.readings_by_device(device).await;

            for mode in FilterMode::ALL {
                let baseline = match self
                    .baseline_calculator
                    .calculate(&readings, device, mode)
                {
                    Some(b) => b,
                    None => continue,
                };

                debug!(
                    device_id = %device,
                    mode = %mode,
                    sample_size = baseline.sample_size,
                    "Baseline updated"
                );

                if let Err(e) = self.store.save_baseline(baseline).await {
                    warn!(device_id = %device, mode = %mode, error = %e, "Failed to save baseline");
                    self.metrics.inc_store_errors();
                    store_down = true;
                    continue;
                }
                updated += 1;
                self.metrics.inc_baselines_updated();
            }
        }

        self.sweep_drift(&devices).await;

        info!(
            updated = updated,
            devices = devices.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Baseline refresh complete"
        );
        self.metrics
            .observe_baseline_refresh(start.elapsed().as_secs_f64());

        if store_down {
            self.registry
                .set_unhealthy(components::BASELINE, "baseline writes failing")
                .await;
        } else if updated == 0 {
            self.registry
                .set_degraded(components::BASELINE, "insufficient data")
                .await;
        } else {
            self.registry.set_healthy(components::BASELINE).await;
        }
    }

    /// Compare each device's recent window against its stored baseline
    async fn sweep_drift(&self, devices: &[String]) {
        for device in devices {
            for mode in FilterMode::ALL {
                let baseline = match self.store.get_baseline(device, mode).await {
                    Some(b) => b,
                    None => continue,
                };

                let recent = self
                    .store
                    .recent_readings_by_device(device, self.config.drift_window)
                    .await;

                let anomalies =
                    detect_drift(self.anomaly_detector.config(), &recent, &baseline);
                if anomalies.is_empty() {
                    continue;
                }

                self.metrics.add_anomalies_detected(anomalies.len() as i64);
                for anomaly in anomalies {
                    self.logger.log_anomaly(
                        &anomaly.device_id,
                        anomaly.anomaly_type.as_str(),
                        anomaly.severity.as_str(),
                        &anomaly.description,
                    );
                    if let Err(e) = self.store.save_anomaly(anomaly).await {
                        warn!(device_id = %device, error = %e, "Failed to save drift anomaly");
                        self.metrics.inc_store_errors();
                    }
                }
            }
        }
    }

    /// Run one filter health analysis over the pre/post streams
    async fn analyze_filter_health(&self) {
        let start = Instant::now();

        let pre = self
            .store
            .recent_readings_by_device(&self.config.pre_device, self.config.stream_limit)
            .await;
        let post = self
            .store
            .recent_readings_by_device(&self.config.post_device, self.config.stream_limit)
            .await;
        let mode = self.store.current_mode().await;

        let health = match self.health_analyzer.analyze(&pre, &post, mode) {
            Ok(health) => health,
            Err(e) => {
                debug!(
                    pre = pre.len(),
                    post = post.len(),
                    reason = %e,
                    "Skipping filter health analysis"
                );
                self.registry
                    .set_degraded(components::FILTER_HEALTH, e.to_string())
                    .await;
                return;
            }
        };

        self.logger.log_health_analysis(
            health.health_score,
            health.health_category(),
            health.predicted_days_remaining,
            health.efficiency_trend.as_str(),
        );
        if health.maintenance_required {
            warn!(
                health_score = health.health_score,
                "Filter maintenance required"
            );
        }
        if health.replacement_urgent {
            warn!(
                health_score = health.health_score,
                days_remaining = health.predicted_days_remaining,
                "Filter replacement urgent"
            );
        }

        if let Err(e) = self.store.save_filter_health(health).await {
            warn!(error = %e, "Failed to save filter health");
            self.metrics.inc_store_errors();
            self.registry
                .set_unhealthy(components::FILTER_HEALTH, "health writes failing")
                .await;
            return;
        }

        self.metrics.inc_health_analyses();
        self.metrics
            .observe_health_analysis(start.elapsed().as_secs_f64());
        self.registry.set_healthy(components::FILTER_HEALTH).await;
    }

    /// Refresh forecasts for every device and mode
    async fn refresh_all_forecasts(&self) {
        let devices = self.store.active_devices().await;
        let mut refreshed = 0usize;

        for device in &devices {
            for mode in FilterMode::ALL {
                if self.refresh_forecast(device, mode, "scheduled").await {
                    refreshed += 1;
                }
            }
        }

        info!(refreshed = refreshed, "Forecast refresh complete");
        if refreshed == 0 {
            self.registry
                .set_degraded(components::FORECAST, "insufficient data")
                .await;
        } else {
            self.registry.set_healthy(components::FORECAST).await;
        }
    }

    /// Regenerate the forecast horizon for one device and mode
    ///
    /// Concurrent refreshes for the same key are harmless: each recomputes
    /// from a fresh read and the last write wins.
    async fn refresh_forecast(&self, device_id: &str, mode: FilterMode, reason: &str) -> bool {
        let start = Instant::now();
        let history = self
            .store
            .recent_readings_by_device(device_id, self.config.history_limit)
            .await;

        let predictions = match self.forecaster.forecast(&history, device_id, mode) {
            Ok(predictions) => predictions,
            Err(e) => {
                debug!(
                    device_id = %device_id,
                    mode = %mode,
                    reason = %reason,
                    error = %e,
                    "Skipping forecast"
                );
                return false;
            }
        };

        let points = predictions.len();
        self.forecasts
            .write()
            .await
            .insert((device_id.to_string(), mode), predictions);

        self.metrics.inc_forecasts_generated();
        self.metrics.observe_forecast(start.elapsed().as_secs_f64());
        self.logger.log_forecast(
            device_id,
            mode.as_str(),
            points,
            start.elapsed().as_millis(),
        );
        true
    }

    /// Detect and persist anomalies for one reading
    async fn detect_and_save_anomalies(&self, reading: &Reading) {
        let baseline = self
            .store
            .get_baseline(&reading.device_id, reading.mode)
            .await;

        let anomalies = self.anomaly_detector.detect(reading, baseline.as_ref());
        if anomalies.is_empty() {
            return;
        }

        self.metrics.add_anomalies_detected(anomalies.len() as i64);
        for anomaly in anomalies {
            self.logger.log_anomaly(
                &anomaly.device_id,
                anomaly.anomaly_type.as_str(),
                anomaly.severity.as_str(),
                &anomaly.description,
            );
            if let Err(e) = self.store.save_anomaly(anomaly).await {
                warn!(device_id = %reading.device_id, error = %e, "Failed to save anomaly");
                self.metrics.inc_store_errors();
            }
        }
    }
}

/// Periodic baseline refresh and drift sweep
async fn baseline_task(inner: Arc<ServiceInner>, mut shutdown: broadcast::Receiver<()>) {
    let delay = jittered(Duration::ZERO, inner.config.startup_jitter);
    info!(
        interval_secs = inner.config.baseline_interval.as_secs(),
        initial_delay_ms = delay.as_millis(),
        "Starting baseline task"
    );

    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = shutdown.recv() => return,
    }

    let mut ticker = tokio::time::interval(inner.config.baseline_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                inner.refresh_baselines().await;
            }
            _ = shutdown.recv() => {
                info!("Shutting down baseline task");
                return;
            }
        }
    }
}

/// Periodic filter health analysis
async fn filter_health_task(inner: Arc<ServiceInner>, mut shutdown: broadcast::Receiver<()>) {
    let delay = jittered(inner.config.health_initial_delay, inner.config.startup_jitter);
    info!(
        interval_secs = inner.config.health_interval.as_secs(),
        initial_delay_ms = delay.as_millis(),
        "Starting filter health task"
    );

    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = shutdown.recv() => return,
    }

    let mut ticker = tokio::time::interval(inner.config.health_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                inner.analyze_filter_health().await;
            }
            _ = shutdown.recv() => {
                info!("Shutting down filter health task");
                return;
            }
        }
    }
}

/// Periodic forecast refresh across all devices
async fn forecast_task(inner: Arc<ServiceInner>, mut shutdown: broadcast::Receiver<()>) {
    let delay = jittered(
        inner.config.forecast_initial_delay,
        inner.config.startup_jitter,
    );
    info!(
        interval_secs = inner.config.forecast_interval.as_secs(),
        initial_delay_ms = delay.as_millis(),
        "Starting forecast task"
    );

    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = shutdown.recv() => return,
    }

    let mut ticker = tokio::time::interval(inner.config.forecast_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                inner.refresh_all_forecasts().await;
            }
            _ = shutdown.recv() => {
                info!("Shutting down forecast task");
                return;
            }
        }
    }
}

/// Base delay plus a pseudo-random jitter up to `max_jitter`
fn jittered(base: Duration, max_jitter: Duration) -> Duration {
    let max_ms = max_jitter.as_millis() as u64;
    if max_ms == 0 {
        return base;
    }

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    base + Duration::from_millis(now % max_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{Duration as ChronoDuration, Utc};

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

    async fn seed_device(store: &MemoryStore, device_id: &str, count: usize) {
        let start = Utc::now() - ChronoDuration::hours(count as i64);
        for i in 0..count {
            store
                .add_reading(Reading {
                    device_id: device_id.to_string(),
                    timestamp: start + ChronoDuration::hours(i as i64),
                    mode: FilterMode::Drinking,
                    flow: 5.0 + (i % 3) as f64 * 0.2,
                    ph: 7.0,
                    turbidity: 10.0,
                    tds: 250.0,
                })
                .await;
        }
    }

    #[tokio::test]
    async fn test_start_is_reentrant() {
        let store = Arc::new(MemoryStore::new());
        let service = AnalyticsService::new(store, fast_config());

        service.start().await;
        assert!(service.is_running().await);
        service.start().await; // second start is a no-op
        assert!(service.is_running().await);

        service.stop().await;
        assert!(!service.is_running().await);
    }

    #[tokio::test]
    async fn test_stop_twice_returns_promptly() {
        let store = Arc::new(MemoryStore::new());
        let service = AnalyticsService::new(store, fast_config());

        service.start().await;
        service.stop().await;
        // The second stop must not block on anything
        tokio::time::timeout(Duration::from_secs(1), service.stop())
            .await
            .expect("second stop hung");
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let service = AnalyticsService::new(store, fast_config());
        service.stop().await;
        assert!(!service.is_running().await);
    }

    #[tokio::test]
    async fn test_baselines_refresh_in_background() {
        let store = Arc::new(MemoryStore::new());
        seed_device(&store, "filter_main", 30).await;

        let service = AnalyticsService::new(Arc::clone(&store) as Arc<dyn AnalyticsStore>, fast_config());
        service.start().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        service.stop().await;

        assert!(store
            .get_baseline("filter_main", FilterMode::Drinking)
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_process_new_reading_detects_sensor_failure() {
        let store = Arc::new(MemoryStore::new());
        let service = AnalyticsService::new(
            Arc::clone(&store) as Arc<dyn AnalyticsStore>,
            ServiceConfig {
                auto_forecast: false,
                ..fast_config()
            },
        );

        // No baseline exists yet; the impossible pH must still be flagged
        service
            .process_new_reading(Reading {
                device_id: "filter_main".to_string(),
                timestamp: Utc::now(),
                mode: FilterMode::Drinking,
                flow: 5.0,
                ph: 15.2,
                turbidity: 10.0,
                tds: 250.0,
            })
            .await;

        let anomalies = store.anomalies().await;
        assert_eq!(anomalies.len(), 1);
        assert_eq!(
            anomalies[0].anomaly_type,
            crate::models::AnomalyType::SensorFailure
        );
        assert_eq!(anomalies[0].severity, crate::models::Severity::Critical);
    }

    #[tokio::test]
    async fn test_forecast_cache_supersedes() {
        let store = Arc::new(MemoryStore::new());
        seed_device(&store, "filter_main", 60).await;

        let service =
            AnalyticsService::new(Arc::clone(&store) as Arc<dyn AnalyticsStore>, fast_config());

        assert!(service
            .inner
            .refresh_forecast("filter_main", FilterMode::Drinking, "test")
            .await);
        let first = service
            .latest_forecast("filter_main", FilterMode::Drinking)
            .await
            .unwrap();
        assert_eq!(first.len(), 24);

        // A second refresh replaces rather than extends the horizon
        assert!(service
            .inner
            .refresh_forecast("filter_main", FilterMode::Drinking, "test")
            .await);
        let second = service
            .latest_forecast("filter_main", FilterMode::Drinking)
            .await
            .unwrap();
        assert_eq!(second.len(), 24);
    }

    #[tokio::test]
    async fn test_forecast_skipped_below_minimum() {
        let store = Arc::new(MemoryStore::new());
        seed_device(&store, "filter_main", 10).await;

        let service =
            AnalyticsService::new(Arc::clone(&store) as Arc<dyn AnalyticsStore>, fast_config());
        assert!(!service
            .inner
            .refresh_forecast("filter_main", FilterMode::Drinking, "test")
            .await);
        assert!(service
            .latest_forecast("filter_main", FilterMode::Drinking)
            .await
            .is_none());
    }
}
