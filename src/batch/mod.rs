//! Batch input handling
//!
//! This module parses the tabular company list that drives a run:
//! - CSV rows with `url` and `industry` columns
//! - row-level validation (blank fields and bad schemes are dropped)
//! - stable entity identifiers derived from normalized URLs

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};
use url::Url;

/// Stable identifier for one company, derived from its normalized URL.
///
/// Two distinct normalized URLs never map to the same identifier, and
/// deriving an identifier twice from the same URL always yields the same
/// value, so checkpoint resumption is stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    /// Derive an identifier from a company URL.
    ///
    /// Normalization: lowercase host, scheme and fragment dropped,
    /// trailing slash trimmed from the path, query kept when present.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = Url::parse(url.trim())?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::Batch(format!("URL has no host: {}", url)))?
            .to_lowercase();

        let path = parsed.path().trim_end_matches('/');
        let mut id = format!("{}{}", host, path);
        if let Some(query) = parsed.query() {
            id.push('?');
            id.push_str(query);
        }

        Ok(EntityId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of one entity within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

/// One company flowing through the pipeline
#[derive(Debug, Clone)]
pub struct Company {
    pub id: EntityId,
    pub url: String,
    pub industry: String,
}

impl Company {
    pub fn new(url: &str, industry: &str) -> Result<Self> {
        Ok(Self {
            id: EntityId::from_url(url)?,
            url: url.trim().to_string(),
            industry: industry.trim().to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CompanyRow {
    url: String,
    industry: String,
}

/// Load and validate the batch input file.
///
/// Fails fast (before any work is dispatched) when the file is missing,
/// a required column is absent, or no valid rows remain. Rows with blank
/// fields or a non-http(s) URL are dropped with a warning.
pub fn load_companies(path: &Path) -> Result<Vec<Company>> {
    if !path.exists() {
        return Err(Error::Batch(format!(
            "Input file not found: {}",
            path.display()
        )));
    }

    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?.clone();
    for required in ["url", "industry"] {
        if !headers.iter().any(|h| h == required) {
            return Err(Error::Batch(format!(
                "Missing required column: {}",
                required
            )));
        }
    }

    let mut companies = Vec::new();
    let mut dropped = 0usize;

    for row in reader.deserialize::<CompanyRow>() {
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping malformed row: {}", e);
                dropped += 1;
                continue;
            }
        };

        let url = row.url.trim();
        let industry = row.industry.trim();

        if url.is_empty() || industry.is_empty() {
            dropped += 1;
            continue;
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            warn!("Skipping URL with unsupported scheme: {}", url);
            dropped += 1;
            continue;
        }

        match Company::new(url, industry) {
            Ok(company) => companies.push(company),
            Err(e) => {
                warn!("Skipping unparseable URL {}: {}", url, e);
                dropped += 1;
            }
        }
    }

    if dropped > 0 {
        warn!("Dropped {} invalid rows from {}", dropped, path.display());
    }

    if companies.is_empty() {
        return Err(Error::Batch("No valid rows in input file".to_string()));
    }

    info!(
        "Loaded {} valid companies from {}",
        companies.len(),
        path.display()
    );
    Ok(companies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_entity_id_idempotent() {
        let a = EntityId::from_url("https://example.com/about").unwrap();
        let b = EntityId::from_url("https://example.com/about").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_entity_id_canonicalization() {
        let https = EntityId::from_url("https://Example.COM/").unwrap();
        let http = EntityId::from_url("http://example.com").unwrap();
        assert_eq!(https, http);
        assert_eq!(https.as_str(), "example.com");
    }

    #[test]
    fn test_entity_id_distinct_paths_do_not_collide() {
        let a = EntityId::from_url("https://a.example.com/team").unwrap();
        let b = EntityId::from_url("https://a.example.com/teams").unwrap();
        assert_ne!(a, b);

        // The mangled-separator scheme of naive slugs would collide these.
        let c = EntityId::from_url("https://a.b.com/c").unwrap();
        let d = EntityId::from_url("https://a.com/b.c").unwrap();
        assert_ne!(c, d);
    }

    #[test]
    fn test_entity_id_keeps_query() {
        let plain = EntityId::from_url("https://example.com/page").unwrap();
        let with_query = EntityId::from_url("https://example.com/page?id=2").unwrap();
        assert_ne!(plain, with_query);
    }

    #[test]
    fn test_load_companies_ok() {
        let file = write_csv(
            "url,industry\n\
             https://acme.com,technology\n\
             https://brick.co,construction\n",
        );

        let companies = load_companies(file.path()).unwrap();
        assert_eq!(companies.len(), 2);
        assert_eq!(companies[0].industry, "technology");
        assert_eq!(companies[0].id.as_str(), "acme.com");
    }

    #[test]
    fn test_load_companies_drops_invalid_rows() {
        let file = write_csv(
            "url,industry\n\
             https://acme.com,technology\n\
             ,healthcare\n\
             https://blank.com,\n\
             ftp://files.example.com,technology\n",
        );

        let companies = load_companies(file.path()).unwrap();
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].url, "https://acme.com");
    }

    #[test]
    fn test_load_companies_missing_column_fails_fast() {
        let file = write_csv("url\nhttps://acme.com\n");
        let err = load_companies(file.path()).unwrap_err();
        assert!(err.to_string().contains("industry"));
    }

    #[test]
    fn test_load_companies_zero_valid_rows_fails() {
        let file = write_csv("url,industry\nnot-a-url,tech\n");
        assert!(load_companies(file.path()).is_err());
    }
}
