use std::sync::Arc;

use anyhow::Result;

use crate::api::RiskApi;
use crate::cache::RiskCache;
use crate::range::TimeRange;
use crate::types::{CurrentRisk, TimeseriesData};

/// Fetch-and-commit orchestration. The only writer of the cache by
/// convention; two overlapping refreshes race and the later commit wins.
pub struct RiskFetcher<A> {
    api: Arc<A>,
    cache: RiskCache,
}

impl<A> Clone for RiskFetcher<A> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<A: RiskApi> RiskFetcher<A> {
    pub fn new(api: Arc<A>, cache: RiskCache) -> Self {
        Self { api, cache }
    }

    pub fn cache(&self) -> &RiskCache {
        &self.cache
    }

    /// Refresh the current-risk snapshot. A failure keeps the last good
    /// snapshot, records the message and marks the cache stale.
    pub async fn refresh_current(&self) -> Result<CurrentRisk> {
        self.cache.set_loading(true);
        self.cache.set_error(None);

        let result = self.api.current_risk().await;
        match &result {
            Ok(risk) => self.cache.commit_snapshot(risk.clone()),
            Err(err) => {
                self.cache.set_error(Some(err.to_string()));
                self.cache.mark_stale();
            }
        }

        self.cache.set_loading(false);
        result
    }

    /// Refresh the series for `range`. Failures go back to the caller only;
    /// they don't touch the snapshot flags.
    pub async fn refresh_timeseries(&self, range: &TimeRange) -> Result<TimeseriesData> {
        let data = self.api.timeseries(range).await?;
        self.cache.commit_timeseries(data.clone());
        Ok(data)
    }
}
