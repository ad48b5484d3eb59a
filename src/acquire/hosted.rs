//! Hosted extraction service client
//!
//! Thin client for a Firecrawl-style scrape API: one POST per URL, the
//! service returns pre-extracted markdown. Used as the primary
//! acquisition strategy when an API key is configured.

use crate::config::AcquireConfig;
use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub struct HostedExtractor {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ScrapeData>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    #[serde(default)]
    markdown: Option<String>,
}

impl HostedExtractor {
    pub fn new(base_url: &str, api_key: String, config: &AcquireConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                Error::Acquisition(format!("Failed to create extraction client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Extract one URL. `Ok(None)` means the service answered but had no
    /// usable content; the caller falls through to the next strategy.
    pub async fn extract(&self, url: &str) -> Result<Option<String>> {
        debug!("Requesting hosted extraction for {}", url);

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|e| Error::Acquisition(format!("Invalid extraction API key: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = ScrapeRequest {
            url,
            formats: vec!["markdown"],
        };

        let response = self
            .client
            .post(format!("{}/v1/scrape", self.base_url))
            .headers(headers)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Acquisition(format!(
                "extraction service returned {}: {}",
                status, text
            )));
        }

        let parsed: ScrapeResponse = response.json().await?;
        if !parsed.success {
            return Ok(None);
        }

        Ok(parsed.data.and_then(|d| d.markdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> AcquireConfig {
        AcquireConfig {
            timeout_secs: 5,
            user_agent: "factsmith-test/0.1".to_string(),
            ..AcquireConfig::default()
        }
    }

    #[tokio::test]
    async fn test_extract_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/scrape"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": { "markdown": "# Acme\n\nWe build rockets." }
            })))
            .mount(&server)
            .await;

        let extractor = HostedExtractor::new(&server.uri(), "key".to_string(), &config()).unwrap();
        let content = extractor.extract("https://acme.com").await.unwrap();

        assert_eq!(content.as_deref(), Some("# Acme\n\nWe build rockets."));
    }

    #[tokio::test]
    async fn test_extract_unsuccessful_response_is_none() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/scrape"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "success": false })),
            )
            .mount(&server)
            .await;

        let extractor = HostedExtractor::new(&server.uri(), "key".to_string(), &config()).unwrap();
        let content = extractor.extract("https://acme.com").await.unwrap();
        assert!(content.is_none());
    }

    #[tokio::test]
    async fn test_extract_http_error_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/scrape"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let extractor = HostedExtractor::new(&server.uri(), "key".to_string(), &config()).unwrap();
        let err = extractor.extract("https://acme.com").await.unwrap_err();
        assert!(err.to_string().contains("429"));
    }
}
