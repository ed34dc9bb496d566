use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactorCategory {
    #[serde(rename = "Supply-Demand")]
    SupplyDemand,
    Macro,
    Financial,
    Geopolitical,
    Sentiment,
}

impl FactorCategory {
    pub const ALL: [FactorCategory; 5] = [
        FactorCategory::SupplyDemand,
        FactorCategory::Macro,
        FactorCategory::Financial,
        FactorCategory::Geopolitical,
        FactorCategory::Sentiment,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorDetail {
    pub name: String,
    pub name_zh: String,
    pub shap: f64,
    pub category: FactorCategory,
    #[serde(default)]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadarScore {
    pub category: String,
    pub category_zh: String,
    pub score: f64,
    #[serde(default)]
    pub top_factors: Vec<FactorDetail>,
}

/// Per-category weights sent to `/api/config/weights`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightConfig {
    pub supply_demand: f64,
    #[serde(rename = "macro")]
    pub macro_: f64,
    pub financial: f64,
    pub geopolitical: f64,
    pub sentiment: f64,
}

impl WeightConfig {
    pub fn total(&self) -> f64 {
        self.supply_demand + self.macro_ + self.financial + self.geopolitical + self.sentiment
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightUpdateResult {
    pub risk_index: f64,
    pub risk_level: String,
    #[serde(default)]
    pub radar_scores: Vec<RadarScore>,
    #[serde(default)]
    pub top_factors: Vec<FactorDetail>,
}
