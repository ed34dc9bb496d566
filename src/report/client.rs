use anyhow::{bail, Context, Result};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;

use super::stream::{ReportCallbacks, ReportHandle, ReportStream};
use super::ReportOpener;
use crate::api::ApiClient;
use crate::config::Config;

/// Opens report streams against `/api/report/{id}?stream=true`.
///
/// Uses its own HTTP client: the request/response client carries a total
/// timeout, and a report stream has none.
#[derive(Clone)]
pub struct ReportClient {
    api: ApiClient,
}

impl ReportClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(cfg.timeout())
            .build()
            .context("building stream client")?;
        Ok(Self {
            api: ApiClient::with_client(client, &cfg.api_base)?,
        })
    }

    /// Open one stream. Must be called inside a tokio runtime. Connection
    /// and HTTP failures arrive through `on_error`, not the return value.
    pub fn open(&self, alert_id: u64, callbacks: ReportCallbacks) -> Result<ReportHandle> {
        if alert_id == 0 {
            bail!("alert id must be a positive integer");
        }
        let url = self.api.report_url(alert_id)?;
        let http = self.api.http().clone();
        let (mut stream, control) = ReportStream::new(alert_id, callbacks);

        let driver = async move {
            let resp = http
                .get(url)
                .header(ACCEPT, "text/event-stream")
                .header(CACHE_CONTROL, "no-cache")
                .send()
                .await
                .and_then(|r| r.error_for_status());
            match resp {
                Ok(resp) => stream.run(resp.bytes_stream()).await,
                Err(err) => stream.fail(err.into()),
            }
        };
        Ok(ReportHandle::spawn(control, driver))
    }
}

impl ReportOpener for ReportClient {
    fn open(&self, alert_id: u64, callbacks: ReportCallbacks) -> Result<ReportHandle> {
        ReportClient::open(self, alert_id, callbacks)
    }
}
