use serde::{Deserialize, Serialize};

use super::factor::FactorCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Low [0,40), Medium [40,70), High [70,100]
    pub fn from_index(risk_index: f64) -> Self {
        if risk_index < 40.0 {
            RiskLevel::Low
        } else if risk_index < 70.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Low" => Some(RiskLevel::Low),
            "Medium" => Some(RiskLevel::Medium),
            "High" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopFactor {
    pub name: String,
    pub name_zh: String,
    pub shap: f64,
    pub category: FactorCategory,
}

/// Latest current-risk value as served by `/api/risk/current`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentRisk {
    pub risk_index: f64,
    pub risk_level: RiskLevel,
    pub date: String,
    #[serde(default)]
    pub top_factors: Vec<TopFactor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeseriesPoint {
    pub date: String,
    pub level: String,
    pub risk_index: f64,
}

/// Parallel arrays keyed by `dates`, plus the alert markers in the range.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeseriesData {
    pub dates: Vec<String>,
    pub oil_price: Vec<f64>,
    pub risk_index: Vec<f64>,
    #[serde(default)]
    pub alerts: Vec<TimeseriesPoint>,
}

impl TimeseriesData {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}
