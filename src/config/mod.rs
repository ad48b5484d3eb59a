//! Configuration management for factsmith
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Embedding/completion provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Content acquisition configuration
    #[serde(default)]
    pub acquire: AcquireConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Vector index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieve: RetrieveConfig,

    /// Generation configuration
    #[serde(default)]
    pub generate: GenerateConfig,

    /// Filesystem paths
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Embedding/completion provider configuration (OpenAI-compatible API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API base URL
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// Environment variable name for the API key
    #[serde(default = "default_provider_api_key_env")]
    pub api_key_env: String,

    /// Completion model identifier
    #[serde(default = "default_completion_model")]
    pub completion_model: String,

    /// Embedding model identifier
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Embedding dimension (must match the model)
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    /// Batch size for embedding requests
    #[serde(default = "default_embedding_batch_size")]
    pub embedding_batch_size: usize,

    /// Maximum tokens per completion
    #[serde(default = "default_completion_max_tokens")]
    pub max_tokens: u32,

    /// Completion temperature
    #[serde(default = "default_completion_temperature")]
    pub temperature: f32,

    /// Embedding price per 1K tokens (USD)
    #[serde(default = "default_embedding_price_per_1k")]
    pub embedding_price_per_1k: f64,

    /// Completion input price per 1K tokens (USD)
    #[serde(default = "default_completion_input_price_per_1k")]
    pub completion_input_price_per_1k: f64,

    /// Completion output price per 1K tokens (USD)
    #[serde(default = "default_completion_output_price_per_1k")]
    pub completion_output_price_per_1k: f64,

    /// Completion calls per second (rate limit toward the provider)
    #[serde(default = "default_completion_calls_per_second")]
    pub completion_calls_per_second: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            api_key_env: default_provider_api_key_env(),
            completion_model: default_completion_model(),
            embedding_model: default_embedding_model(),
            embedding_dimension: default_embedding_dimension(),
            embedding_batch_size: default_embedding_batch_size(),
            max_tokens: default_completion_max_tokens(),
            temperature: default_completion_temperature(),
            embedding_price_per_1k: default_embedding_price_per_1k(),
            completion_input_price_per_1k: default_completion_input_price_per_1k(),
            completion_output_price_per_1k: default_completion_output_price_per_1k(),
            completion_calls_per_second: default_completion_calls_per_second(),
        }
    }
}

impl ProviderConfig {
    /// Resolve the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).map_err(|_| {
            Error::Config(format!(
                "Provider API key not found: set the {} environment variable",
                self.api_key_env
            ))
        })
    }
}

/// Content acquisition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireConfig {
    /// Hosted extraction API base URL
    #[serde(default = "default_hosted_base_url")]
    pub hosted_base_url: String,

    /// Environment variable name for the hosted extraction API key.
    /// The hosted strategy is only attempted when this variable is set.
    #[serde(default = "default_hosted_api_key_env")]
    pub hosted_api_key_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub timeout_secs: u64,

    /// User agent string
    #[serde(default = "default_acquire_user_agent")]
    pub user_agent: String,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            hosted_base_url: default_hosted_base_url(),
            hosted_api_key_env: default_hosted_api_key_env(),
            timeout_secs: default_acquire_timeout(),
            user_agent: default_acquire_user_agent(),
        }
    }
}

impl AcquireConfig {
    /// Hosted extraction API key, if configured in the environment
    pub fn hosted_api_key(&self) -> Option<String> {
        std::env::var(&self.hosted_api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Words per chunk window
    #[serde(default = "default_chunk_window_words")]
    pub window_words: usize,

    /// Overlapping words between consecutive windows
    #[serde(default = "default_chunk_overlap_words")]
    pub overlap_words: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            window_words: default_chunk_window_words(),
            overlap_words: default_chunk_overlap_words(),
        }
    }
}

impl ChunkConfig {
    /// Validate the window/overlap relation. Overlap must be strictly
    /// smaller than the window or the chunk loop cannot advance.
    pub fn validate(&self) -> Result<()> {
        if self.window_words == 0 {
            return Err(Error::Chunking("window_words must be > 0".to_string()));
        }
        if self.overlap_words >= self.window_words {
            return Err(Error::Chunking(format!(
                "overlap_words ({}) must be smaller than window_words ({})",
                self.overlap_words, self.window_words
            )));
        }
        Ok(())
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Qdrant connection URL
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    /// Qdrant collection name
    #[serde(default = "default_collection_name")]
    pub collection_name: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            qdrant_url: default_qdrant_url(),
            collection_name: default_collection_name(),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveConfig {
    /// Total evidence items per factsheet
    #[serde(default = "default_retrieve_total_k")]
    pub total_k: usize,

    /// Maximum distinct queries per factsheet
    #[serde(default = "default_retrieve_max_queries")]
    pub max_queries: usize,

    /// Maximum cosine distance for evidence (lower distance = more relevant)
    #[serde(default = "default_retrieve_max_distance")]
    pub max_distance: f32,
}

impl Default for RetrieveConfig {
    fn default() -> Self {
        Self {
            total_k: default_retrieve_total_k(),
            max_queries: default_retrieve_max_queries(),
            max_distance: default_retrieve_max_distance(),
        }
    }
}

/// Generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateConfig {
    /// Minimum factsheet word count
    #[serde(default = "default_generate_min_words")]
    pub min_words: usize,

    /// Maximum factsheet word count
    #[serde(default = "default_generate_max_words")]
    pub max_words: usize,

    /// Target word count for the first draft
    #[serde(default = "default_generate_target_words")]
    pub target_words: usize,

    /// Retries when the word count misses the [min_words, max_words] window
    #[serde(default = "default_generate_max_retries")]
    pub max_retries: usize,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            min_words: default_generate_min_words(),
            max_words: default_generate_max_words(),
            target_words: default_generate_target_words(),
            max_retries: default_generate_max_retries(),
        }
    }
}

/// Filesystem paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Checkpoint file for resumable batches
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: PathBuf,

    /// Directory for generated factsheets and metadata
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory for the extracted-content cache
    #[serde(default = "default_extracted_dir")]
    pub extracted_dir: PathBuf,

    /// Directory containing factsheet templates
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            checkpoint_file: default_checkpoint_file(),
            output_dir: default_output_dir(),
            extracted_dir: default_extracted_dir(),
            templates_dir: default_templates_dir(),
        }
    }
}

impl Config {
    /// Default config file path (current directory)
    pub fn default_config_path() -> PathBuf {
        PathBuf::from("factsmith.toml")
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.chunk.validate()?;
        Ok(config)
    }

    /// Load configuration from the given path, falling back to defaults
    /// when no config file exists.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_config_path);

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            info!(
                "No config file at {}; using defaults",
                config_path.display()
            );
            Ok(Config::default())
        }
    }

    /// Write the configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Wrote config to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.chunk.window_words, 1000);
        assert_eq!(config.chunk.overlap_words, 200);
        assert_eq!(config.retrieve.total_k, 6);
        assert_eq!(config.generate.min_words, 600);
        assert_eq!(config.generate.max_words, 1000);
        assert_eq!(config.index.collection_name, "factsmith_segments");
    }

    #[test]
    fn test_chunk_config_validation() {
        let valid = ChunkConfig {
            window_words: 1000,
            overlap_words: 200,
        };
        assert!(valid.validate().is_ok());

        let overlap_too_big = ChunkConfig {
            window_words: 100,
            overlap_words: 100,
        };
        assert!(overlap_too_big.validate().is_err());

        let zero_window = ChunkConfig {
            window_words: 0,
            overlap_words: 0,
        };
        assert!(zero_window.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [generate]
            target_words = 750
            "#,
        )
        .unwrap();

        assert_eq!(config.generate.target_words, 750);
        assert_eq!(config.generate.min_words, 600);
        assert_eq!(config.chunk.window_words, 1000);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("factsmith.toml");

        let mut config = Config::default();
        config.retrieve.total_k = 8;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.retrieve.total_k, 8);
    }
}
