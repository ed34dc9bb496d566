//! Shared, observable risk state.
//!
//! `RiskCache` is a cheap handle over a `tokio::sync::watch` channel: every
//! clone writes to and reads from the same state, and any number of
//! subscribers are woken on change. Commits replace whole values; there is no
//! merging and no ordering guard between concurrent writers, so the last
//! commit wins.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::watch;

use crate::logging::{log, obj, v_bool, v_num, v_str, Domain, Level};
use crate::types::{CurrentRisk, TimeseriesData};

#[derive(Debug, Clone, Default)]
pub struct RiskState {
    pub current: Option<Arc<CurrentRisk>>,
    pub timeseries: Option<Arc<TimeseriesData>>,
    pub loading: bool,
    pub error: Option<String>,
    /// Set when a refresh failed after a good snapshot was committed.
    pub stale: bool,
}

#[derive(Clone)]
pub struct RiskCache {
    tx: Arc<watch::Sender<RiskState>>,
}

impl Default for RiskCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskCache {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RiskState::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<RiskState> {
        self.tx.subscribe()
    }

    /// Copy of the current state. Payloads are shared, not deep-copied.
    pub fn state(&self) -> RiskState {
        self.tx.borrow().clone()
    }

    pub fn commit_snapshot(&self, value: CurrentRisk) {
        log(
            Level::Debug,
            Domain::Cache,
            "commit_snapshot",
            obj(&[
                ("date", v_str(&value.date)),
                ("risk_index", v_num(value.risk_index)),
            ]),
        );
        let value = Arc::new(value);
        self.tx.send_modify(|s| {
            s.current = Some(value);
            s.stale = false;
        });
    }

    pub fn commit_timeseries(&self, value: TimeseriesData) {
        log(
            Level::Debug,
            Domain::Cache,
            "commit_timeseries",
            obj(&[("points", json!(value.len()))]),
        );
        let value = Arc::new(value);
        self.tx.send_modify(|s| s.timeseries = Some(value));
    }

    pub fn set_loading(&self, loading: bool) {
        self.tx.send_modify(|s| s.loading = loading);
    }

    pub fn set_error(&self, message: Option<String>) {
        if let Some(msg) = &message {
            log(
                Level::Warn,
                Domain::Cache,
                "error",
                obj(&[("msg", v_str(msg))]),
            );
        }
        self.tx.send_modify(|s| s.error = message);
    }

    pub fn mark_stale(&self) {
        let has_snapshot = self.tx.borrow().current.is_some();
        log(
            Level::Info,
            Domain::Cache,
            "mark_stale",
            obj(&[("has_snapshot", v_bool(has_snapshot))]),
        );
        self.tx.send_modify(|s| s.stale = true);
    }
}
