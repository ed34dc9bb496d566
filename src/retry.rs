//! Exponential backoff for callers that want to re-issue a failed request.
//!
//! Nothing in the API client or the report stream retries on its own; the
//! command-line driver wraps its periodic refresh in [`retry_async`] with
//! [`crate::api::is_transient`] deciding which failures get another try.

use std::future::Future;

use anyhow::{anyhow, Result};
use rand::Rng;
use serde_json::json;
use tokio::time::{sleep, Duration};

use crate::logging::{log, obj, v_str, Domain, Level};

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 250,
            max_delay_ms: 10_000,
            jitter_factor: 0.3,
        }
    }
}

impl RetryConfig {
    /// Exponential delay clamped to `max_delay_ms`, then ± `jitter_factor`.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms as f64 * 2.0_f64.powi(attempt as i32);
        let clamped = base.min(self.max_delay_ms as f64);

        let jitter_range = clamped * self.jitter_factor;
        let jitter: f64 = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        Duration::from_millis((clamped + jitter).max(0.0) as u64)
    }
}

/// Run `operation` until it succeeds, `should_retry` rejects its error, or
/// `max_retries` re-tries are used up. The last error is returned.
pub async fn retry_async<F, Fut, T, P>(
    config: &RetryConfig,
    operation_name: &str,
    should_retry: P,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&anyhow::Error) -> bool,
{
    let mut last_error: Option<anyhow::Error> = None;

    for attempt in 0..=config.max_retries {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !should_retry(&e) {
                    log(
                        Level::Info,
                        Domain::System,
                        "retry_skipped",
                        obj(&[
                            ("operation", v_str(operation_name)),
                            ("attempt", json!(attempt + 1)),
                            ("msg", v_str(&e.to_string())),
                        ]),
                    );
                    return Err(e);
                }
                if attempt < config.max_retries {
                    let delay = config.delay_for_attempt(attempt);
                    log(
                        Level::Warn,
                        Domain::System,
                        "retry",
                        obj(&[
                            ("operation", v_str(operation_name)),
                            ("attempt", json!(attempt + 1)),
                            ("of", json!(config.max_retries + 1)),
                            ("delay_ms", json!(delay.as_millis() as u64)),
                            ("msg", v_str(&e.to_string())),
                        ]),
                    );
                    sleep(delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("{} exhausted without error", operation_name)))
}
