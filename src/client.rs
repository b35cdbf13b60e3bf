use std::future::Future;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::constants::{
    ANALYSIS_PATH, DATA_PATH, FETCH_ERROR_MSG, MALFORMED_RESPONSE_MSG, NO_INSIGHTS_MSG,
};
use crate::error::{Error, Result};

/// Source of readings and of the remote summary.
///
/// `request_analysis` always settles to displayable text: every failure mode
/// already has a user-facing message, so there is nothing to propagate.
pub trait ReadingBackend: Send + Sync + 'static {
    fn fetch_reading(&self) -> impl Future<Output = Result<f64>> + Send;

    fn request_analysis(&self, values: Vec<f64>) -> impl Future<Output = String> + Send;
}

#[derive(Deserialize, Debug)]
struct ReadingResponse {
    value: f64,
}

#[derive(Serialize, Debug)]
struct AnalysisRequest<'a> {
    data: &'a [f64],
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    data_url: String,
    analysis_url: String,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            data_url: config.endpoint(DATA_PATH),
            analysis_url: config.endpoint(ANALYSIS_PATH),
        }
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }
}

impl ReadingBackend for HttpBackend {
    async fn fetch_reading(&self) -> Result<f64> {
        let response = self.client.get(&self.data_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }
        let body = response.text().await?;
        decode_reading(&body)
    }

    async fn request_analysis(&self, values: Vec<f64>) -> String {
        let response = match self
            .client
            .post(&self.analysis_url)
            .json(&AnalysisRequest { data: &values })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(
                    error = %e,
                    url = %self.analysis_url,
                    "Network error contacting analysis service"
                );
                return FETCH_ERROR_MSG.to_string();
            }
        };

        // The body decides the outcome, including on 4xx/5xx.
        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => {
                debug!(status, body = %body, "Raw analysis response");
                decode_analysis(&body)
            }
            Err(e) => {
                error!(error = %e, status, "Failed to read analysis response body");
                FETCH_ERROR_MSG.to_string()
            }
        }
    }
}

pub fn decode_reading(body: &str) -> Result<f64> {
    let reading: ReadingResponse = serde_json::from_str(body)?;
    Ok(reading.value)
}

/// Maps an analysis response body to the text shown to the user.
pub fn decode_analysis(body: &str) -> String {
    let json = match serde_json::from_str::<Value>(body) {
        Ok(Value::Null) | Err(_) => {
            warn!(body = %body, "Analysis response is not a JSON document");
            return MALFORMED_RESPONSE_MSG.to_string();
        }
        Ok(json) => json,
    };

    if let Some(analysis) = json
        .get("analysis")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
    {
        return analysis.to_string();
    }

    warn!(body = %body, "Analysis response has no insight");
    json.get("error")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .unwrap_or(NO_INSIGHTS_MSG)
        .to_string()
}
