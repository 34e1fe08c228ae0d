//! HTTP client for the Dog CEO API

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use qa_common::{QaError, QaResult};

/// Configuration for the API client, the `[api]` table of a suite config
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL, without the `/api` prefix
    pub base_url: String,

    /// Headers sent with every request
    pub extra_headers: BTreeMap<String, String>,

    /// Budget for a single request
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let mut extra_headers = BTreeMap::new();
        extra_headers.insert("Accept".to_string(), "application/json".to_string());
        Self {
            base_url: "https://dog.ceo".to_string(),
            extra_headers,
            request_timeout_ms: 30_000,
        }
    }
}

/// A fully read response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Decode the body as JSON; an undecodable body is an assertion failure
    pub fn json(&self) -> QaResult<Value> {
        serde_json::from_slice(&self.body)
            .map_err(|e| QaError::assertion("body", "valid JSON", e))
    }
}

/// Request context for one test; not shared between tests
pub struct DogApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl DogApiClient {
    pub fn new(config: &ApiConfig) -> QaResult<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.extra_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| QaError::Config(format!("invalid header name {:?}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| QaError::Config(format!("invalid header value {:?}: {}", value, e)))?;
            headers.insert(name, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Absolute URLs pass through; paths are joined to the base URL
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    pub async fn get(&self, path: &str) -> QaResult<ApiResponse> {
        let url = self.url_for(path);
        debug!("GET {}", url);

        let response = self.http.get(&url).send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        Ok(ApiResponse {
            url,
            status,
            content_type,
            body,
        })
    }
}
