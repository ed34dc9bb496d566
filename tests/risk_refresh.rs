//! Envelope handling and cache refresh against a fake backend.

mod common;

use std::sync::Arc;

use common::{dead_base, envelope_fail, envelope_ok, spawn, Reply};
use oilrisk_client::api::ApiClient;
use oilrisk_client::cache::RiskCache;
use oilrisk_client::config::Config;
use oilrisk_client::fetch::RiskFetcher;
use oilrisk_client::range::TimeRange;
use oilrisk_client::types::{
    AlertQuery, BacktestModel, BacktestParams, RiskLevel, TriggerType, WeightConfig,
};
use serde_json::json;

fn api(base: &str) -> ApiClient {
    let cfg = Config {
        api_base: base.to_string(),
        ..Config::default()
    };
    ApiClient::new(&cfg).unwrap()
}

fn current_risk_json(index: f64, level: &str) -> serde_json::Value {
    json!({
        "riskIndex": index,
        "riskLevel": level,
        "date": "2024-03-01",
        "topFactors": [
            {"name": "Brent spread", "nameZh": "布伦特价差", "shap": 0.21, "category": "Financial"}
        ]
    })
}

#[tokio::test]
async fn failure_envelope_sets_error_and_stale() {
    let backend = spawn(vec![(
        "GET /api/risk/current",
        Reply::Json("200 OK", envelope_fail(500, "db down")),
    )]);
    let cache = RiskCache::new();
    let fetcher = RiskFetcher::new(Arc::new(api(&backend.base)), cache.clone());

    let err = fetcher.refresh_current().await.unwrap_err();
    assert_eq!(err.to_string(), "db down");

    let state = cache.state();
    assert_eq!(state.error.as_deref(), Some("db down"));
    assert!(state.stale);
    assert!(!state.loading);
    assert!(state.current.is_none());
}

#[tokio::test]
async fn failure_envelope_with_error_status_uses_envelope_message() {
    let backend = spawn(vec![(
        "GET /api/risk/current",
        Reply::Json("500 Internal Server Error", envelope_fail(500, "db down")),
    )]);
    let err = api(&backend.base).current_risk().await.unwrap_err();
    assert_eq!(err.to_string(), "db down");
}

#[tokio::test]
async fn successful_refresh_commits_snapshot() {
    let backend = spawn(vec![(
        "GET /api/risk/current",
        Reply::Json("200 OK", envelope_ok(current_risk_json(72.4, "High"))),
    )]);
    let cache = RiskCache::new();
    let mut rx = cache.subscribe();
    let fetcher = RiskFetcher::new(Arc::new(api(&backend.base)), cache.clone());

    let risk = fetcher.refresh_current().await.unwrap();
    assert_eq!(risk.risk_level, RiskLevel::High);

    assert!(rx.has_changed().unwrap());
    let seen = rx.borrow_and_update().clone();
    assert_eq!(seen.current.unwrap().top_factors[0].name_zh, "布伦特价差");
    assert!(!seen.stale);
    assert!(seen.error.is_none());
}

#[tokio::test]
async fn unreachable_backend_keeps_last_good_snapshot() {
    let backend = spawn(vec![(
        "GET /api/risk/current",
        Reply::Json("200 OK", envelope_ok(current_risk_json(35.0, "Low"))),
    )]);
    let cache = RiskCache::new();
    RiskFetcher::new(Arc::new(api(&backend.base)), cache.clone())
        .refresh_current()
        .await
        .unwrap();

    let offline = RiskFetcher::new(Arc::new(api(&dead_base())), cache.clone());
    assert!(offline.refresh_current().await.is_err());

    let state = cache.state();
    assert!(state.stale);
    assert!(state.error.is_some());
    assert_eq!(state.current.unwrap().risk_index, 35.0);
}

#[tokio::test]
async fn timeseries_commit() {
    let backend = spawn(vec![(
        "GET /api/factors/timeseries?start=2024-01-01&end=2024-01-03",
        Reply::Json(
            "200 OK",
            envelope_ok(json!({
                "dates": ["2024-01-01", "2024-01-02", "2024-01-03"],
                "oilPrice": [77.1, 78.4, 76.9],
                "riskIndex": [41.0, 44.5, 72.0],
                "alerts": [{"date": "2024-01-03", "level": "High", "riskIndex": 72.0}]
            })),
        ),
    )]);
    let cache = RiskCache::new();
    let fetcher = RiskFetcher::new(Arc::new(api(&backend.base)), cache.clone());
    let range = TimeRange::custom("custom", "2024-01-01", "2024-01-03").unwrap();

    fetcher.refresh_timeseries(&range).await.unwrap();
    let series = cache.state().timeseries.unwrap();
    assert_eq!(series.len(), 3);
    assert_eq!(series.alerts[0].risk_index, 72.0);
}

#[tokio::test]
async fn alerts_and_detail() {
    let record = json!({
        "id": 3, "date": "2024-02-10", "level": "Medium", "riskIndex": 58.2,
        "triggerType": "ANOMALY", "triggerFactor": "Tanker rates", "triggerFactorZh": "油轮运价",
        "summary": "运价异常", "summaryEn": "Tanker rate anomaly", "aiReport": null
    });
    let mut detail = record.clone();
    detail["triggerRules"] = json!([]);
    let backend = spawn(vec![
        (
            "GET /api/alerts?page=1&size=5",
            Reply::Json(
                "200 OK",
                envelope_ok(json!({"total": 1, "page": 1, "size": 5, "records": [record]})),
            ),
        ),
        ("GET /api/alerts/3", Reply::Json("200 OK", envelope_ok(detail))),
        ("GET /api/alerts/4", Reply::Json("200 OK", envelope_fail(404, "Alert not found: 4"))),
    ]);
    let api = api(&backend.base);

    let page = api
        .alerts(&AlertQuery {
            page: Some(1),
            size: Some(5),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.records[0].trigger_type, TriggerType::Anomaly);

    let detail = api.alert_detail(3).await.unwrap();
    assert_eq!(detail.record.trigger_factor_zh, "油轮运价");
    assert!(detail.trigger_rules.is_empty());

    let err = api.alert_detail(4).await.unwrap_err();
    assert_eq!(err.to_string(), "Alert not found: 4");
}

#[tokio::test]
async fn weights_and_backtest() {
    let backend = spawn(vec![
        (
            "PUT /api/config/weights",
            Reply::Json(
                "200 OK",
                envelope_ok(json!({
                    "riskIndex": 61.0, "riskLevel": "Medium",
                    "radarScores": [{"category": "Macro", "categoryZh": "宏观", "score": 55.0, "topFactors": []}],
                    "topFactors": []
                })),
            ),
        ),
        (
            "POST /api/predict/backtest",
            Reply::Json(
                "200 OK",
                envelope_ok(json!({
                    "dates": ["2023-01-01"], "actual": [1.0], "predicted": [0.8],
                    "hitRate": 0.7, "falseAlarmRate": 0.1, "mae": 0.2, "directionAccuracy": 0.65
                })),
            ),
        ),
    ]);
    let api = api(&backend.base);

    let result = api
        .update_weights(&WeightConfig {
            supply_demand: 0.3,
            macro_: 0.2,
            financial: 0.2,
            geopolitical: 0.2,
            sentiment: 0.1,
        })
        .await
        .unwrap();
    assert_eq!(result.radar_scores[0].category_zh, "宏观");

    let bt = api
        .run_backtest(&BacktestParams {
            start_date: "2023-01-01".into(),
            end_date: "2023-06-30".into(),
            model: BacktestModel::Lstm,
        })
        .await
        .unwrap();
    assert_eq!(bt.direction_accuracy, 0.65);

    let inverted = api
        .run_backtest(&BacktestParams {
            start_date: "2023-06-30".into(),
            end_date: "2023-01-01".into(),
            model: BacktestModel::Lstm,
        })
        .await;
    assert!(inverted.is_err());
}
