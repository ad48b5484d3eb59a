//! Output artifacts
//!
//! Writes per-company factsheets (`{slug}.md`) with a structured metadata
//! sidecar (`{slug}.json`), and maintains the extracted-content cache
//! that backs the skip-re-acquisition fast path.

use crate::acquire::AcquireMethod;
use crate::batch::EntityId;
use crate::error::Result;
use crate::generate::{company_name_from_url, Factsheet};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Result of one factsheet write
#[derive(Debug, Clone, Serialize)]
pub struct WriteReceipt {
    pub path: PathBuf,
    pub slug: String,
    pub skipped: bool,
}

/// Metadata sidecar written next to each factsheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactsheetMetadata {
    pub url: String,
    pub industry: String,
    pub word_count: usize,
    pub word_count_valid: bool,
    pub attempts: usize,
    pub generation_cost: f64,
    pub evidence_count: usize,
    pub model: String,
    pub generated_at: DateTime<Utc>,
}

/// Writes factsheets and their metadata sidecars
pub struct FactsheetWriter {
    output_dir: PathBuf,
}

impl FactsheetWriter {
    pub fn new(output_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(output_dir)?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// Write one factsheet plus metadata. Existing files are left alone
    /// unless `overwrite` is set.
    pub fn write(
        &self,
        url: &str,
        industry: &str,
        factsheet: &Factsheet,
        overwrite: bool,
    ) -> Result<WriteReceipt> {
        let extracted_name = company_name_from_factsheet(&factsheet.text);
        let slug = slugify(url, extracted_name.as_deref());

        let path = self.output_dir.join(format!("{}.md", slug));
        if path.exists() && !overwrite {
            warn!("Factsheet already exists, skipping: {}", path.display());
            return Ok(WriteReceipt {
                path,
                slug,
                skipped: true,
            });
        }

        std::fs::write(&path, &factsheet.text)?;

        let metadata = FactsheetMetadata {
            url: url.to_string(),
            industry: industry.to_string(),
            word_count: factsheet.word_count,
            word_count_valid: factsheet.word_count_valid,
            attempts: factsheet.attempts,
            generation_cost: factsheet.cost,
            evidence_count: factsheet.evidence_count,
            model: factsheet.model.clone(),
            generated_at: Utc::now(),
        };
        let metadata_path = self.output_dir.join(format!("{}.json", slug));
        std::fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)?;

        info!(
            "Wrote factsheet for {} to {} ({} words)",
            url,
            path.display(),
            factsheet.word_count
        );

        Ok(WriteReceipt {
            path,
            slug,
            skipped: false,
        })
    }
}

/// Derive a filesystem slug from a company name or, failing that, the
/// URL's first domain label.
pub fn slugify(url: &str, company_name: Option<&str>) -> String {
    static SUFFIX: OnceLock<Regex> = OnceLock::new();
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();

    let suffix = SUFFIX.get_or_init(|| {
        Regex::new(r"\s+(inc|corp|corporation|company|llc|ltd)\.?\s*$").expect("suffix regex")
    });
    let non_word = NON_WORD.get_or_init(|| Regex::new(r"[^\w\s-]").expect("non-word regex"));
    let separators = SEPARATORS.get_or_init(|| Regex::new(r"[-\s]+").expect("separator regex"));

    let base = company_name
        .map(|n| n.to_string())
        .unwrap_or_else(|| company_name_from_url(url));

    let lowered = base.to_lowercase();
    let trimmed = suffix.replace(&lowered, "");
    let cleaned = non_word.replace_all(&trimmed, "");
    let slug = separators
        .replace_all(&cleaned, "-")
        .trim_matches('-')
        .to_string();

    if slug.len() >= 3 {
        return slug;
    }

    // Fall back to the domain label when the name yields nothing usable.
    let domain_slug = company_name_from_url(url).to_lowercase();
    if domain_slug.len() >= 2 {
        domain_slug
    } else {
        "company".to_string()
    }
}

/// Pull a probable company name from a factsheet's first heading,
/// stripping factsheet/corporate suffixes.
pub fn company_name_from_factsheet(text: &str) -> Option<String> {
    static TRAILER: OnceLock<Regex> = OnceLock::new();
    let trailer = TRAILER.get_or_init(|| {
        Regex::new(r"(?i)\s*[•\-–—|]\s*.*(industry|company|factsheet).*$").expect("trailer regex")
    });

    for line in text.lines() {
        let line = line.trim();
        if let Some(heading) = line.strip_prefix("# ") {
            let name = trailer.replace(heading, "").trim().to_string();
            if !name.is_empty() {
                return Some(name);
            }
        }
    }
    None
}

/// One cached extraction, content-addressed by entity id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub url: String,
    pub text: String,
    pub method: String,
    pub fetched_at: DateTime<Utc>,
}

impl ExtractedRecord {
    pub fn new(url: &str, text: String, method: AcquireMethod) -> Self {
        Self {
            url: url.to_string(),
            text,
            method: method.as_str().to_string(),
            fetched_at: Utc::now(),
        }
    }
}

/// Cache of cleaned per-entity text, keyed by entity id. Backs the
/// orchestrator's skip-re-acquisition fast path.
pub struct ExtractedStore {
    dir: PathBuf,
}

impl ExtractedStore {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn path_for(&self, id: &EntityId) -> PathBuf {
        let sanitized: String = id
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        // Short hash suffix keeps distinct ids distinct after sanitizing.
        let digest = blake3::hash(id.as_str().as_bytes()).to_hex().to_string();
        self.dir.join(format!("{}-{}.json", sanitized, &digest[..12]))
    }

    /// Load the cached extraction for an entity, if valid
    pub fn load(&self, id: &EntityId) -> Option<ExtractedRecord> {
        let path = self.path_for(id);
        if !path.exists() {
            return None;
        }

        match std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str::<ExtractedRecord>(&content).ok())
        {
            Some(record) if !record.text.trim().is_empty() => {
                debug!("Extracted-content cache hit for {}", id);
                Some(record)
            }
            _ => {
                warn!("Ignoring unreadable or empty cache entry for {}", id);
                None
            }
        }
    }

    /// Persist an extraction for future runs
    pub fn save(&self, id: &EntityId, record: &ExtractedRecord) -> Result<()> {
        let path = self.path_for(id);
        std::fs::write(&path, serde_json::to_string_pretty(record)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factsheet(text: &str) -> Factsheet {
        Factsheet {
            text: text.to_string(),
            word_count: crate::generate::count_words(text),
            word_count_valid: true,
            attempts: 1,
            cost: 0.01,
            evidence_count: 4,
            model: "test-model".to_string(),
        }
    }

    #[test]
    fn test_slugify_from_name() {
        assert_eq!(slugify("https://drees.com", Some("Drees Homes")), "drees-homes");
        assert_eq!(slugify("https://acme.com", Some("Acme Corp")), "acme");
        assert_eq!(slugify("https://x.io", Some("Tesla, Inc")), "tesla");
    }

    #[test]
    fn test_slugify_falls_back_to_domain() {
        assert_eq!(slugify("https://microsoft.com", None), "microsoft");
        assert_eq!(slugify("https://ab.io", Some("A")), "ab");
    }

    #[test]
    fn test_company_name_from_factsheet_heading() {
        let name = company_name_from_factsheet(
            "# Drees Homes • Construction Industry Factsheet\n\nBody text.",
        );
        assert_eq!(name.as_deref(), Some("Drees Homes"));

        assert_eq!(company_name_from_factsheet("no heading here"), None);
    }

    #[test]
    fn test_write_factsheet_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FactsheetWriter::new(dir.path()).unwrap();

        let sheet = factsheet("# Acme\n\nAcme builds rockets.");
        let receipt = writer
            .write("https://acme.com", "technology", &sheet, false)
            .unwrap();

        assert!(!receipt.skipped);
        assert!(receipt.path.exists());

        let metadata_path = dir.path().join(format!("{}.json", receipt.slug));
        let metadata: FactsheetMetadata =
            serde_json::from_str(&std::fs::read_to_string(metadata_path).unwrap()).unwrap();
        assert_eq!(metadata.url, "https://acme.com");
        assert_eq!(metadata.evidence_count, 4);
    }

    #[test]
    fn test_write_skips_existing_unless_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FactsheetWriter::new(dir.path()).unwrap();
        let sheet = factsheet("# Acme\n\nFirst version.");

        let first = writer
            .write("https://acme.com", "technology", &sheet, false)
            .unwrap();
        assert!(!first.skipped);

        let second = writer
            .write("https://acme.com", "technology", &sheet, false)
            .unwrap();
        assert!(second.skipped);

        let third = writer
            .write("https://acme.com", "technology", &sheet, true)
            .unwrap();
        assert!(!third.skipped);
    }

    #[test]
    fn test_extracted_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ExtractedStore::new(dir.path()).unwrap();
        let id = EntityId::from_url("https://acme.com").unwrap();

        assert!(store.load(&id).is_none());

        let record = ExtractedRecord::new(
            "https://acme.com",
            "Cleaned homepage text.".to_string(),
            AcquireMethod::Direct,
        );
        store.save(&id, &record).unwrap();

        let loaded = store.load(&id).expect("cache hit");
        assert_eq!(loaded.text, "Cleaned homepage text.");
        assert_eq!(loaded.method, "direct");
    }

    #[test]
    fn test_extracted_store_ignores_empty_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = ExtractedStore::new(dir.path()).unwrap();
        let id = EntityId::from_url("https://empty.com").unwrap();

        let record = ExtractedRecord::new("https://empty.com", "   ".to_string(), AcquireMethod::Direct);
        store.save(&id, &record).unwrap();

        assert!(store.load(&id).is_none());
    }

    #[test]
    fn test_extracted_store_distinct_ids_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = ExtractedStore::new(dir.path()).unwrap();

        // Sanitizing both ids yields "a_b_c"; the hash suffix keeps them apart.
        let a = EntityId::from_url("https://a.b/c").unwrap();
        let b = EntityId::from_url("https://a.b.c").unwrap();
        assert_ne!(store.path_for(&a), store.path_for(&b));
    }
}
