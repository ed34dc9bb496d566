pub mod api;
pub mod cache;
pub mod config;
pub mod fetch;
pub mod logging;
pub mod prefs;
pub mod range;
pub mod report;
pub mod retry;
pub mod types;
