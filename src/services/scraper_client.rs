//! HTTP client for the external scraping service.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

use crate::config::ScraperConfig;

#[derive(Debug, Clone, Error)]
pub enum ScraperError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("json error: {0}")]
    Serde(String),
    /// The service answered but reported `success: false`
    #[error("{0}")]
    Service(String),
}

/// Structured fields returned by `/api/scrape`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapedFields {
    pub data: Map<String, Value>,
    pub total_cost: f64,
}

/// The two scraper operations the extraction pipeline relies on
#[async_trait]
pub trait ScraperBackend: Send + Sync {
    /// Full page text with no summarization
    async fn raw_content(&self, url: &str) -> Result<String, ScraperError>;

    /// Named fields pulled from the page by the scraper's model
    async fn scrape(&self, url: &str, fields: &[&str]) -> Result<ScrapedFields, ScraperError>;

    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct RawContentRequest<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct RawContentResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    raw_content: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    fields: &'a [&'a str],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Map<String, Value>>,
    #[serde(default)]
    jobs: Option<Vec<Map<String, Value>>>,
    #[serde(default)]
    metadata: Option<ScrapeMetadata>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeMetadata {
    #[serde(default)]
    total_cost: Option<f64>,
}

impl ScrapeResponse {
    fn into_fields(self) -> Result<ScrapedFields, ScraperError> {
        if !self.success {
            return Err(ScraperError::Service(self.error.unwrap_or_else(|| "Extraction failed".to_string())));
        }
        let data = self
            .data
            .or_else(|| self.jobs.and_then(|jobs| jobs.into_iter().next()))
            .unwrap_or_default();
        let total_cost = self.metadata.and_then(|m| m.total_cost).unwrap_or(0.0);
        Ok(ScrapedFields { data, total_cost })
    }
}

#[derive(Debug, Clone)]
pub struct ScraperClient {
    http: Client,
    base_url: String,
    model: String,
}

impl ScraperClient {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScraperError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("zaytoonz-api/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScraperError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    async fn post<B: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(&self, path: &str, body: &B) -> Result<R, ScraperError> {
        let res = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ScraperError::Http { status: status.as_u16(), body });
        }
        res.json::<R>().await.map_err(|e| ScraperError::Serde(e.to_string()))
    }
}

#[async_trait]
impl ScraperBackend for ScraperClient {
    async fn raw_content(&self, url: &str) -> Result<String, ScraperError> {
        let response: RawContentResponse = self.post("/api/raw-content", &RawContentRequest { url }).await?;
        if !response.success {
            return Err(ScraperError::Service(response.error.unwrap_or_else(|| "Raw content unavailable".to_string())));
        }
        Ok(response.raw_content.unwrap_or_default())
    }

    async fn scrape(&self, url: &str, fields: &[&str]) -> Result<ScrapedFields, ScraperError> {
        let request = ScrapeRequest { url, fields, model: &self.model };
        let response: ScrapeResponse = self.post("/api/scrape", &request).await?;
        response.into_fields()
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ScraperError {
    if e.is_timeout() {
        ScraperError::Timeout
    } else {
        ScraperError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scrape_response_prefers_data_then_first_job() {
        let with_data: ScrapeResponse = serde_json::from_value(json!({
            "success": true,
            "data": {"title": "Program Officer"},
            "metadata": {"total_cost": 0.0021}
        }))
        .unwrap();
        let fields = with_data.into_fields().unwrap();
        assert_eq!(fields.data["title"], "Program Officer");
        assert_eq!(fields.total_cost, 0.0021);

        let with_jobs: ScrapeResponse = serde_json::from_value(json!({
            "success": true,
            "jobs": [{"title": "First"}, {"title": "Second"}]
        }))
        .unwrap();
        let fields = with_jobs.into_fields().unwrap();
        assert_eq!(fields.data["title"], "First");
        assert_eq!(fields.total_cost, 0.0);
    }

    #[test]
    fn unsuccessful_scrape_carries_service_error() {
        let failed: ScrapeResponse = serde_json::from_value(json!({"success": false, "error": "blocked"})).unwrap();
        assert_eq!(failed.into_fields().unwrap_err().to_string(), "blocked");

        let bare: ScrapeResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(bare.into_fields().unwrap_err().to_string(), "Extraction failed");
    }

    #[test]
    fn client_trims_base_url() {
        let config = ScraperConfig {
            base_url: "http://scraper.local:8000/".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 5,
        };
        let client = ScraperClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://scraper.local:8000");
        assert_eq!(client.model(), "gpt-4o-mini");
    }
}
