use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BacktestModel {
    XGBoost,
    #[serde(rename = "ARIMA")]
    Arima,
    #[serde(rename = "LSTM")]
    Lstm,
}

impl BacktestModel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xgboost" => Some(BacktestModel::XGBoost),
            "arima" => Some(BacktestModel::Arima),
            "lstm" => Some(BacktestModel::Lstm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestParams {
    pub start_date: String,
    pub end_date: String,
    pub model: BacktestModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub dates: Vec<String>,
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
    pub hit_rate: f64,
    pub false_alarm_rate: f64,
    pub mae: f64,
    pub direction_accuracy: f64,
}
