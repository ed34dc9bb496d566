//! Structured logging for the risk client.
//!
//! Every record is a single JSON line with a monotonically increasing `seq`,
//! an RFC3339 timestamp, a level, a domain and a free-form `data` object.
//! Records go to stderr so that command output on stdout stays parseable,
//! and are mirrored to `LOG_FILE` when that variable is set.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        Self::parse(std::env::var("LOG_LEVEL").as_deref().unwrap_or("info"))
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "trace" => Level::Trace,
            "debug" => Level::Debug,
            "warn" => Level::Warn,
            "error" => Level::Error,
            "fatal" => Level::Fatal,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Api,    // Envelope requests against the backend
    Stream, // Report stream lifecycle
    Cache,  // Risk cache commits and flags
    Prefs,  // Persisted user preferences
    System, // Startup, shutdown, retries
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Api => "api",
            Domain::Stream => "stream",
            Domain::Cache => "cache",
            Domain::Prefs => "prefs",
            Domain::System => "system",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS is a comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Sinks
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static FILE_SINK: OnceLock<Option<Mutex<BufWriter<File>>>> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

fn file_sink() -> Option<&'static Mutex<BufWriter<File>>> {
    FILE_SINK
        .get_or_init(|| {
            let path = std::env::var("LOG_FILE").ok()?;
            match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(f) => Some(Mutex::new(BufWriter::new(f))),
                Err(err) => {
                    eprintln!("[log] failed to open {}: {}", path, err);
                    None
                }
            }
        })
        .as_ref()
}

fn sanitize_fields(mut fields: Map<String, Value>) -> Map<String, Value> {
    let redacted = Value::String("[REDACTED]".to_string());
    for key in ["authorization", "Authorization", "api_key", "token_secret"] {
        if fields.contains_key(key) {
            fields.insert(key.to_string(), redacted.clone());
        }
    }
    fields
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["alert_id", "endpoint", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    let line = render(level, domain, event, fields);
    eprintln!("{}", line);
    if let Some(sink) = file_sink() {
        if let Ok(mut w) = sink.lock() {
            let _ = writeln!(w, "{}", line);
            let _ = w.flush();
        }
    }
}

fn render(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) -> String {
    let fields = sanitize_fields(fields);
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));
    Value::Object(entry).to_string()
}

// =============================================================================
// Domain helpers
// =============================================================================

pub fn log_request(method: &str, endpoint: &str) {
    log(
        Level::Debug,
        Domain::Api,
        "request",
        obj(&[("method", v_str(method)), ("endpoint", v_str(endpoint))]),
    );
}

pub fn log_request_failed(endpoint: &str, reason: &str) {
    log(
        Level::Warn,
        Domain::Api,
        "request_failed",
        obj(&[("endpoint", v_str(endpoint)), ("msg", v_str(reason))]),
    );
}

pub fn log_stream_state(alert_id: u64, state: &str, tokens: u64) {
    log(
        Level::Info,
        Domain::Stream,
        "state",
        obj(&[
            ("alert_id", json!(alert_id)),
            ("state", v_str(state)),
            ("tokens", json!(tokens)),
        ]),
    );
}

// =============================================================================
// Field builders
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

pub fn v_bool(b: bool) -> Value {
    Value::Bool(b)
}
