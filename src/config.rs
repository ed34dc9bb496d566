use std::time::Duration;

use crate::retry::RetryConfig;

#[derive(Debug, Clone)]
pub struct Config {
    /// Backend origin, e.g. `http://localhost:8080`; paths are joined onto it.
    pub api_base: String,
    pub timeout_secs: u64,
    pub prefs_path: String,
    pub refresh_secs: u64,
    pub retry_max: u32,
    pub retry_base_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8080".to_string(),
            timeout_secs: 10,
            prefs_path: "oilrisk-prefs.json".to_string(),
            refresh_secs: 60,
            retry_max: 3,
            retry_base_ms: 250,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            api_base: std::env::var("OILRISK_API_BASE").unwrap_or(d.api_base),
            timeout_secs: env_parse("OILRISK_TIMEOUT_SECS").unwrap_or(d.timeout_secs),
            prefs_path: std::env::var("OILRISK_PREFS_PATH").unwrap_or(d.prefs_path),
            refresh_secs: env_parse("OILRISK_REFRESH_SECS").unwrap_or(d.refresh_secs),
            retry_max: env_parse("OILRISK_RETRY_MAX").unwrap_or(d.retry_max),
            retry_base_ms: env_parse("OILRISK_RETRY_BASE_MS").unwrap_or(d.retry_base_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retry_max,
            base_delay_ms: self.retry_base_ms,
            ..RetryConfig::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
