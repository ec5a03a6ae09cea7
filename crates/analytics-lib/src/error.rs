//! Error taxonomy for the analytics components
//!
//! Nothing here is fatal to the owning process. Callers treat every variant
//! as "skip this cycle and retry on the next tick". A missing baseline is
//! not an error at all (detection simply returns no anomalies), and store
//! write failures surface as `anyhow::Error` at the service layer where
//! they are logged without aborting the rest of the batch.

use thiserror::Error;

/// Non-fatal failures produced by the analytics components
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The historical sample is below the component's minimum
    #[error("insufficient data: need at least {needed} readings, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Too few pre/post readings lined up within the pairing window
    #[error("insufficient matched pre/post reading pairs: need at least {needed}, got {got}")]
    InsufficientPairs { needed: usize, got: usize },
}

impl AnalyticsError {
    /// True when the failure only means more history must accumulate
    pub fn is_insufficient_data(&self) -> bool {
        matches!(
            self,
            AnalyticsError::InsufficientData { .. } | AnalyticsError::InsufficientPairs { .. }
        )
    }
}
