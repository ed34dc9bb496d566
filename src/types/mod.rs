//! Wire types for the risk backend. Field names follow the backend's
//! camelCase JSON.

pub mod alert;
pub mod backtest;
pub mod factor;
pub mod risk;

pub use alert::{AlertDetail, AlertPage, AlertQuery, AlertRecord, TriggerRule, TriggerType};
pub use backtest::{BacktestModel, BacktestParams, BacktestResult};
pub use factor::{FactorCategory, FactorDetail, RadarScore, WeightConfig, WeightUpdateResult};
pub use risk::{CurrentRisk, RiskLevel, TimeseriesData, TimeseriesPoint, TopFactor};
