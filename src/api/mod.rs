use anyhow::Result;
use async_trait::async_trait;

use crate::range::TimeRange;
use crate::types::{CurrentRisk, TimeseriesData};

pub mod client;
pub mod envelope;

pub use client::ApiClient;
pub use envelope::{ApiFailure, Envelope};

/// Whether a failed call is worth re-issuing. Transport errors and
/// server-side envelope codes are; a refused request is not.
pub fn is_transient(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<ApiFailure>() {
        Some(failure) => failure.is_retryable(),
        None => true,
    }
}

/// The two reads that populate the risk cache.
#[async_trait]
pub trait RiskApi: Send + Sync {
    async fn current_risk(&self) -> Result<CurrentRisk>;
    async fn timeseries(&self, range: &TimeRange) -> Result<TimeseriesData>;
}
