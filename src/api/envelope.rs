use std::fmt;

use anyhow::{anyhow, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub const SUCCESS_CODE: i64 = 200;

/// A failure the backend reported inside a well-formed envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub code: i64,
    pub message: String,
}

impl ApiFailure {
    /// Server-side codes may clear up on their own; anything below 500 is
    /// the request itself being refused.
    pub fn is_retryable(&self) -> bool {
        self.code >= 500
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiFailure {}

/// `{code, message, data}` wrapper every non-streaming endpoint returns.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Any code other than 200 is a failure carrying the envelope's message.
    pub fn into_result(self) -> Result<T> {
        if self.code != SUCCESS_CODE {
            let message = match self.message {
                Some(msg) if !msg.is_empty() => msg,
                _ => "Request failed".to_string(),
            };
            return Err(ApiFailure {
                code: self.code,
                message,
            }
            .into());
        }
        self.data
            .ok_or_else(|| anyhow!("response envelope carried no data"))
    }
}

/// Decode a response body. The envelope decides success whenever it parses,
/// whatever the HTTP status was; the status only matters when it doesn't.
pub fn decode<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    match serde_json::from_str::<Envelope<T>>(body) {
        Ok(envelope) => envelope.into_result(),
        Err(err) if status.is_success() => Err(anyhow!("malformed response envelope: {}", err)),
        Err(_) => Err(anyhow!("Request failed with status code {}", status.as_u16())),
    }
}
