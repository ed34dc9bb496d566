use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

use super::envelope::decode;
use super::RiskApi;
use crate::config::Config;
use crate::logging::{log_request, log_request_failed};
use crate::range::TimeRange;
use crate::types::{
    AlertDetail, AlertPage, AlertQuery, BacktestParams, BacktestResult, CurrentRisk,
    FactorDetail, RadarScore, TimeseriesData, WeightConfig, WeightUpdateResult,
};

/// Typed wrappers over the backend's envelope endpoints. No retries: a
/// failed call is returned as-is and the caller decides what to do.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base: String,
}

impl ApiClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout())
            .build()
            .context("building http client")?;
        Self::with_client(client, &cfg.api_base)
    }

    pub fn with_client(client: Client, base: &str) -> Result<Self> {
        Url::parse(base).with_context(|| format!("invalid api base {:?}", base))?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Absolute URL for a backend path; keeps any path prefix on the base.
    pub fn url(&self, path: &str) -> Result<Url> {
        let raw = format!("{}{}", self.base, path);
        Url::parse(&raw).with_context(|| format!("invalid endpoint url {:?}", raw))
    }

    /// Endpoint that streams the AI report for one alert.
    pub fn report_url(&self, alert_id: u64) -> Result<Url> {
        let mut url = self.url(&format!("/api/report/{}", alert_id))?;
        url.query_pairs_mut().append_pair("stream", "true");
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, endpoint: &str, req: RequestBuilder) -> Result<T> {
        let result: Result<T> = async {
            let resp = req.send().await?;
            let status = resp.status();
            let body = resp.text().await?;
            decode::<T>(status, &body)
        }
        .await;
        if let Err(err) = &result {
            log_request_failed(endpoint, &err.to_string());
        }
        result
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        log_request("GET", path);
        let req = self.client.get(self.url(path)?).query(query);
        self.send(path, req).await
    }

    pub async fn current_risk(&self) -> Result<CurrentRisk> {
        self.get("/api/risk/current", &[]).await
    }

    pub async fn timeseries(&self, range: &TimeRange) -> Result<TimeseriesData> {
        let query = [("start", range.start.clone()), ("end", range.end.clone())];
        self.get("/api/factors/timeseries", &query).await
    }

    pub async fn alerts(&self, query: &AlertQuery) -> Result<AlertPage> {
        self.get("/api/alerts", &query.to_pairs()).await
    }

    pub async fn alert_detail(&self, id: u64) -> Result<AlertDetail> {
        self.get(&format!("/api/alerts/{}", id), &[]).await
    }

    pub async fn factor_explanation(&self, date: &str) -> Result<Vec<FactorDetail>> {
        crate::range::parse_date(date)?;
        self.get(&format!("/api/explain/{}", date), &[]).await
    }

    pub async fn radar_scores(&self, date: Option<&str>) -> Result<Vec<RadarScore>> {
        let mut query = Vec::new();
        if let Some(date) = date {
            crate::range::parse_date(date)?;
            query.push(("date", date.to_string()));
        }
        self.get("/api/risk/radar", &query).await
    }

    pub async fn update_weights(&self, weights: &WeightConfig) -> Result<WeightUpdateResult> {
        let path = "/api/config/weights";
        if weights.total() <= 0.0 {
            bail!("weights must sum to a positive value");
        }
        log_request("PUT", path);
        let req = self.client.put(self.url(path)?).json(weights);
        self.send(path, req).await
    }

    pub async fn run_backtest(&self, params: &BacktestParams) -> Result<BacktestResult> {
        let path = "/api/predict/backtest";
        let start = crate::range::parse_date(&params.start_date)?;
        let end = crate::range::parse_date(&params.end_date)?;
        if start > end {
            bail!("backtest start {} is after end {}", params.start_date, params.end_date);
        }
        log_request("POST", path);
        let req = self.client.post(self.url(path)?).json(params);
        self.send(path, req).await
    }
}

#[async_trait]
impl RiskApi for ApiClient {
    async fn current_risk(&self) -> Result<CurrentRisk> {
        ApiClient::current_risk(self).await
    }

    async fn timeseries(&self, range: &TimeRange) -> Result<TimeseriesData> {
        ApiClient::timeseries(self, range).await
    }
}
