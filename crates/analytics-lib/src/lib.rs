//! Analytics library for water-filtration monitoring
//!
//! This crate provides the core functionality for:
//! - Statistical baselines over historical sensor readings
//! - Anomaly detection (spikes, drops, outliers, sensor failures, drift)
//! - Filter health assessment and remaining-life prediction
//! - Sensor value forecasting
//! - Background orchestration over an abstract storage backend

pub mod anomaly;
pub mod baseline;
pub mod error;
pub mod filter_health;
pub mod forecast;
pub mod health;
pub mod models;
pub mod observability;
pub mod service;
pub mod store;

pub use error::AnalyticsError;
pub use health::{ComponentHealth, ComponentStatus, HealthRegistry, HealthSnapshot};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
pub use service::{AnalyticsService, ServiceConfig, ServiceStatus};
pub use store::{AnalyticsStore, MemoryStore};
