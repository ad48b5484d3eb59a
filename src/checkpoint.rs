//! Resumable run state
//!
//! The checkpoint file records which entities finished (successfully or
//! not) so an interrupted batch can resume without repeating work. Shape:
//! `{"processed": [id...], "failed": [{url, industry, error, timestamp}...]}`.
//! An identifier appears in at most one of the two sets at write time.

use crate::batch::EntityId;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// One failed entity with enough context to retry it by hand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedEntity {
    pub url: String,
    pub industry: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Durable record of per-entity outcomes across runs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    pub processed: Vec<String>,
    pub failed: Vec<FailedEntity>,
}

impl Checkpoint {
    /// Load a checkpoint from disk. A missing file is an empty state,
    /// not an error; an unreadable file is reported and treated as empty
    /// so a damaged checkpoint never blocks a run.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Checkpoint::default();
        }

        match std::fs::read_to_string(path).map_err(crate::error::Error::from).and_then(|content| {
            serde_json::from_str::<Checkpoint>(&content).map_err(Into::into)
        }) {
            Ok(checkpoint) => {
                info!(
                    "Loaded checkpoint: {} processed, {} failed",
                    checkpoint.processed.len(),
                    checkpoint.failed.len()
                );
                checkpoint
            }
            Err(e) => {
                warn!("Failed to load checkpoint {}: {}", path.display(), e);
                Checkpoint::default()
            }
        }
    }

    /// Write the checkpoint to disk, replacing any previous file.
    ///
    /// Written to a sibling temp file first and renamed into place so a
    /// crash mid-write leaves the previous checkpoint intact.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Whether an entity already completed successfully in a prior run
    pub fn is_processed(&self, id: &EntityId) -> bool {
        self.processed.iter().any(|p| p == id.as_str())
    }

    /// Record a success. The id is removed from the failed set if an
    /// earlier run recorded it there, keeping the two sets disjoint.
    pub fn record_success(&mut self, id: &EntityId) {
        let entity_url_matches = |f: &FailedEntity| {
            EntityId::from_url(&f.url)
                .map(|fid| fid == *id)
                .unwrap_or(false)
        };
        self.failed.retain(|f| !entity_url_matches(f));

        if !self.is_processed(id) {
            self.processed.push(id.as_str().to_string());
        }
    }

    /// Record a failure. Ignored when the entity is already in the
    /// processed set; an existing failed entry for the same URL is
    /// replaced rather than duplicated.
    pub fn record_failure(&mut self, id: &EntityId, entry: FailedEntity) {
        if self.is_processed(id) {
            return;
        }
        self.failed.retain(|f| f.url != entry.url);
        self.failed.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(url: &str) -> FailedEntity {
        FailedEntity {
            url: url.to_string(),
            industry: "technology".to_string(),
            error: "boom".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::load(&dir.path().join("nope.json"));
        assert!(checkpoint.processed.is_empty());
        assert!(checkpoint.failed.is_empty());
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");

        let mut checkpoint = Checkpoint::default();
        let id = EntityId::from_url("https://acme.com").unwrap();
        checkpoint.record_success(&id);
        checkpoint.record_failure(
            &EntityId::from_url("https://broken.io").unwrap(),
            failed("https://broken.io"),
        );
        checkpoint.save(&path).unwrap();

        let loaded = Checkpoint::load(&path);
        assert_eq!(loaded.processed, vec!["acme.com".to_string()]);
        assert_eq!(loaded.failed.len(), 1);
        assert_eq!(loaded.failed[0].url, "https://broken.io");
    }

    #[test]
    fn test_success_clears_earlier_failure() {
        let mut checkpoint = Checkpoint::default();
        let id = EntityId::from_url("https://flaky.com").unwrap();

        checkpoint.record_failure(&id, failed("https://flaky.com"));
        assert_eq!(checkpoint.failed.len(), 1);

        checkpoint.record_success(&id);
        assert!(checkpoint.is_processed(&id));
        assert!(checkpoint.failed.is_empty());
    }

    #[test]
    fn test_failure_after_success_is_ignored() {
        let mut checkpoint = Checkpoint::default();
        let id = EntityId::from_url("https://solid.com").unwrap();

        checkpoint.record_success(&id);
        checkpoint.record_failure(&id, failed("https://solid.com"));

        assert!(checkpoint.is_processed(&id));
        assert!(checkpoint.failed.is_empty());
    }

    #[test]
    fn test_repeated_failure_is_replaced_not_duplicated() {
        let mut checkpoint = Checkpoint::default();
        let id = EntityId::from_url("https://flaky.com").unwrap();

        checkpoint.record_failure(&id, failed("https://flaky.com"));
        checkpoint.record_failure(&id, failed("https://flaky.com"));
        assert_eq!(checkpoint.failed.len(), 1);
    }

    #[test]
    fn test_corrupt_file_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        std::fs::write(&path, "{not json").unwrap();

        let checkpoint = Checkpoint::load(&path);
        assert!(checkpoint.processed.is_empty());
    }
}
