//! Content acquisition
//!
//! This module fetches raw content for one company via a two-step
//! strategy chain:
//! - a hosted extraction service (attempted first when configured)
//! - a direct HTTP fetch of the homepage plus one discovered "about"
//!   page as the fallback
//!
//! Both strategies apply the configured timeout and user agent. Failure
//! of both yields an [`Error::Acquisition`] carrying the last cause;
//! retry policy lives with the orchestrator, not here.

mod hosted;

pub use hosted::*;

use crate::chunk::extract_text;
use crate::config::AcquireConfig;
use crate::error::{Error, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// How the content was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireMethod {
    Hosted,
    Direct,
}

impl AcquireMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcquireMethod::Hosted => "hosted",
            AcquireMethod::Direct => "direct",
        }
    }
}

/// Raw acquisition output. Never mutated after creation; ownership moves
/// to the normalizer.
#[derive(Debug, Clone)]
pub struct RawContent {
    pub url: String,
    /// Homepage content: HTML for the direct path, extracted markdown
    /// for the hosted path.
    pub body: String,
    /// Extracted text of the secondary "about" page, when one was found.
    pub about_text: Option<String>,
    pub method: AcquireMethod,
    pub bytes: usize,
}

/// Link keywords that identify a company "about" page
const ABOUT_KEYWORDS: &[&str] = &[
    "about",
    "about-us",
    "aboutus",
    "company",
    "our-story",
    "who-we-are",
    "whoweare",
    "about-company",
];

/// Fetches company content with a hosted-service strategy and a
/// direct-fetch fallback.
pub struct Acquirer {
    client: Client,
    hosted: Option<HostedExtractor>,
}

impl Acquirer {
    pub fn new(config: &AcquireConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Acquisition(format!("Failed to create HTTP client: {}", e)))?;

        let hosted = config
            .hosted_api_key()
            .map(|key| HostedExtractor::new(&config.hosted_base_url, key, config))
            .transpose()?;

        Ok(Self { client, hosted })
    }

    /// Acquire content for one company URL.
    ///
    /// The hosted strategy is attempted first when configured; an empty
    /// or failed hosted response falls through to the direct fetch.
    pub async fn acquire(&self, url: &str) -> Result<RawContent> {
        let mut last_error = None;

        if let Some(hosted) = &self.hosted {
            match hosted.extract(url).await {
                Ok(Some(markdown)) if !markdown.trim().is_empty() => {
                    debug!("Hosted extraction succeeded for {}", url);
                    let bytes = markdown.len();
                    return Ok(RawContent {
                        url: url.to_string(),
                        body: markdown,
                        about_text: None,
                        method: AcquireMethod::Hosted,
                        bytes,
                    });
                }
                Ok(_) => {
                    debug!("Hosted extraction returned no usable content for {}", url);
                }
                Err(e) => {
                    warn!("Hosted extraction failed for {}: {}", url, e);
                    last_error = Some(e.to_string());
                }
            }
        }

        match self.fetch_direct(url).await {
            Ok(content) => Ok(content),
            Err(e) => {
                let cause = e.to_string();
                Err(Error::Acquisition(format!(
                    "all strategies failed for {}: {}",
                    url,
                    last_error.map_or(cause.clone(), |first| format!("{}; {}", first, cause))
                )))
            }
        }
    }

    /// Direct fetch: homepage HTML plus one discovered about page.
    async fn fetch_direct(&self, url: &str) -> Result<RawContent> {
        debug!("Fetching {} directly", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Acquisition(format!("HTTP {}: {}", status, url)));
        }

        let homepage = response.text().await?;
        let bytes = homepage.len();

        let about_text = match find_about_url(url, &homepage) {
            Some(about_url) => self.fetch_about(&about_url).await,
            None => None,
        };

        Ok(RawContent {
            url: url.to_string(),
            body: homepage,
            about_text,
            method: AcquireMethod::Direct,
            bytes,
        })
    }

    /// Best-effort fetch of the about page. Failures are logged and the
    /// entity continues with homepage content only.
    async fn fetch_about(&self, about_url: &str) -> Option<String> {
        debug!("Fetching about page {}", about_url);

        let response = match self.client.get(about_url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("About page {} returned HTTP {}", about_url, r.status());
                return None;
            }
            Err(e) => {
                warn!("Failed to fetch about page {}: {}", about_url, e);
                return None;
            }
        };

        match response.text().await {
            Ok(html) => {
                let text = extract_text(&html);
                if text.trim().is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
            Err(e) => {
                warn!("Failed to read about page {}: {}", about_url, e);
                None
            }
        }
    }
}

/// Scan homepage links for an about page, matching the keyword set over
/// both href and link text. Relative links are resolved against the base
/// URL.
pub fn find_about_url(base_url: &str, html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").ok()?;
    let base = Url::parse(base_url).ok()?;

    for elem in document.select(&selector) {
        let Some(href) = elem.value().attr("href") else {
            continue;
        };
        let href_lower = href.to_lowercase();
        let text_lower = elem.text().collect::<String>().to_lowercase();

        let matched = ABOUT_KEYWORDS
            .iter()
            .any(|k| href_lower.contains(k) || text_lower.contains(k));
        if !matched {
            continue;
        }

        if href_lower.starts_with("mailto:") || href_lower.starts_with("javascript:") {
            continue;
        }

        return match base.join(&href) {
            Ok(resolved) => Some(resolved.to_string()),
            Err(_) => None,
        };
    }

    None
}
