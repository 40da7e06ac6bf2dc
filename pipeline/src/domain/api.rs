//! Statistics API client
//!
//! The external API accepts a batch of series identifiers plus a year range
//! and returns per-series, per-period observations. The `SeriesApi` trait
//! is the seam the Fetcher is tested through; `HttpSeriesApi` is the
//! production implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::core::constants::API_TIMEOUT_SECS;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request failed ({status}): {message}")]
    Status { status: String, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

// =============================================================================
// Wire types
// =============================================================================

/// One raw per-period observation as returned by the API.
///
/// `year` and `value` arrive as strings and are parsed downstream by the
/// Wrangler; this layer keeps the payload opaque beyond field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawObservation {
    pub year: String,
    pub period: String,
    #[serde(rename = "periodName")]
    pub period_name: String,
    pub value: String,
    #[serde(default)]
    pub footnotes: Vec<RawFootnote>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFootnote {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// All observations returned for one series identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSeries {
    #[serde(rename = "seriesID")]
    pub series_id: String,
    #[serde(default)]
    pub data: Vec<RawObservation>,
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    seriesid: &'a [String],
    startyear: String,
    endyear: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    registrationkey: Option<&'a str>,
}

#[derive(Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    message: Vec<String>,
    #[serde(rename = "Results", default)]
    results: Option<ResultsBody>,
}

#[derive(Deserialize, Default)]
struct ResultsBody {
    #[serde(default)]
    series: Vec<RawSeries>,
}

const STATUS_SUCCEEDED: &str = "REQUEST_SUCCEEDED";

/// Parse a response body, mapping a non-succeeded API status to an error
fn parse_response(body: &str) -> Result<Vec<RawSeries>, ApiError> {
    let response: ApiResponse =
        serde_json::from_str(body).map_err(|e| ApiError::Malformed(e.to_string()))?;

    if response.status != STATUS_SUCCEEDED {
        return Err(ApiError::Status {
            status: response.status,
            message: response.message.join("; "),
        });
    }

    Ok(response.results.unwrap_or_default().series)
}

// =============================================================================
// Client
// =============================================================================

/// Batch lookup of time-series observations by identifier set and year range
#[async_trait]
pub trait SeriesApi: Send + Sync {
    async fn fetch_series(
        &self,
        ids: &[String],
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<RawSeries>, ApiError>;
}

/// HTTP implementation over the public statistics API
pub struct HttpSeriesApi {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpSeriesApi {
    pub fn new(endpoint: &str, api_key: Option<&str>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.map(str::to_string),
        })
    }
}

#[async_trait]
impl SeriesApi for HttpSeriesApi {
    async fn fetch_series(
        &self,
        ids: &[String],
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<RawSeries>, ApiError> {
        let request = ApiRequest {
            seriesid: ids,
            startyear: start_year.to_string(),
            endyear: end_year.to_string(),
            registrationkey: self.api_key.as_deref(),
        };

        tracing::debug!(count = ids.len(), start_year, end_year, "API call");

        let body = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "status": "REQUEST_SUCCEEDED",
        "responseTime": 120,
        "message": [],
        "Results": {
            "series": [{
                "seriesID": "LNS14000000",
                "data": [
                    {"year": "2015", "period": "M02", "periodName": "February",
                     "value": "5.5", "footnotes": [{}]},
                    {"year": "2015", "period": "M01", "periodName": "January",
                     "value": "5.7", "footnotes": [{"code": "P", "text": "Preliminary"}]}
                ]
            }]
        }
    }"#;

    #[test]
    fn test_parse_succeeded_response() {
        let series = parse_response(SAMPLE).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].series_id, "LNS14000000");
        assert_eq!(series[0].data.len(), 2);
        assert_eq!(series[0].data[1].period_name, "January");
        assert_eq!(series[0].data[1].value, "5.7");
        assert_eq!(
            series[0].data[1].footnotes[0].text.as_deref(),
            Some("Preliminary")
        );
    }

    #[test]
    fn test_parse_failed_status() {
        let body = r#"{
            "status": "REQUEST_NOT_PROCESSED",
            "message": ["invalid registration key", "daily quota exceeded"]
        }"#;
        let err = parse_response(body).unwrap_err();
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, "REQUEST_NOT_PROCESSED");
                assert!(message.contains("quota"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_malformed_body() {
        let err = parse_response("not json").unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }

    #[test]
    fn test_request_omits_absent_key() {
        let ids = vec!["LNS14000000".to_string()];
        let req = ApiRequest {
            seriesid: &ids,
            startyear: "2000".to_string(),
            endyear: "2015".to_string(),
            registrationkey: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("registrationkey"));
    }
}
