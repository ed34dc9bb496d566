use serde::{Deserialize, Serialize};

use super::risk::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerType {
    Threshold,
    Trend,
    Anomaly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub id: u64,
    pub date: String,
    pub level: RiskLevel,
    pub risk_index: f64,
    pub trigger_type: TriggerType,
    pub trigger_factor: String,
    pub trigger_factor_zh: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub summary_en: Option<String>,
    #[serde(default)]
    pub ai_report: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRule {
    pub rule_type: TriggerType,
    pub factor: String,
    pub factor_zh: String,
    pub current_value: f64,
    pub threshold: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDetail {
    #[serde(flatten)]
    pub record: AlertRecord,
    #[serde(default)]
    pub trigger_rules: Vec<TriggerRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPage {
    pub total: u64,
    pub page: u32,
    pub size: u32,
    pub records: Vec<AlertRecord>,
}

/// Query for `/api/alerts`. Unset fields are left to the backend defaults
/// (page 1, size 20, sorted by date descending).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub level: Option<RiskLevel>,
    pub sort: Option<String>,
}

impl AlertQuery {
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(page) = self.page {
            out.push(("page", page.to_string()));
        }
        if let Some(size) = self.size {
            out.push(("size", size.to_string()));
        }
        if let Some(level) = self.level {
            out.push(("level", level.as_str().to_string()));
        }
        if let Some(sort) = &self.sort {
            out.push(("sort", sort.clone()));
        }
        out
    }
}
