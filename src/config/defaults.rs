//! Default values for configuration

/// Default provider API base URL (OpenAI-compatible)
pub fn default_provider_base_url() -> String {
    std::env::var("FACTSMITH_PROVIDER_URL")
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string())
}

/// Default environment variable holding the provider API key
pub fn default_provider_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Default completion model
pub fn default_completion_model() -> String {
    "gpt-4".to_string()
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

/// Default embedding dimension (text-embedding-3-small)
pub fn default_embedding_dimension() -> usize {
    1536
}

/// Default batch size for embedding requests
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default completion max tokens
pub fn default_completion_max_tokens() -> u32 {
    2000
}

/// Default completion temperature
pub fn default_completion_temperature() -> f32 {
    0.3
}

/// Default embedding price per 1K tokens (USD)
pub fn default_embedding_price_per_1k() -> f64 {
    0.00002
}

/// Default completion input price per 1K tokens (USD)
pub fn default_completion_input_price_per_1k() -> f64 {
    0.03
}

/// Default completion output price per 1K tokens (USD)
pub fn default_completion_output_price_per_1k() -> f64 {
    0.06
}

/// Default completion calls per second (generation pacing)
pub fn default_completion_calls_per_second() -> u32 {
    1
}

/// Default hosted extraction API base URL
pub fn default_hosted_base_url() -> String {
    std::env::var("FACTSMITH_EXTRACTOR_URL")
        .unwrap_or_else(|_| "https://api.firecrawl.dev".to_string())
}

/// Default environment variable holding the hosted extraction API key
pub fn default_hosted_api_key_env() -> String {
    "FIRECRAWL_API_KEY".to_string()
}

/// Default acquisition timeout in seconds
pub fn default_acquire_timeout() -> u64 {
    30
}

/// Default user agent for acquisition requests
pub fn default_acquire_user_agent() -> String {
    format!(
        "factsmith/{} (Company Factsheet Generator)",
        env!("CARGO_PKG_VERSION")
    )
}

/// Default words per chunk window
pub fn default_chunk_window_words() -> usize {
    1000
}

/// Default overlapping words between consecutive windows
pub fn default_chunk_overlap_words() -> usize {
    200
}

/// Default Qdrant gRPC URL for local development (port 6334, not 6333 REST)
pub fn default_qdrant_url() -> String {
    std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6334".to_string())
}

/// Default collection name
pub fn default_collection_name() -> String {
    "factsmith_segments".to_string()
}

/// Default evidence items per factsheet
pub fn default_retrieve_total_k() -> usize {
    6
}

/// Default maximum distinct retrieval queries per factsheet
pub fn default_retrieve_max_queries() -> usize {
    4
}

/// Default maximum cosine distance for retrieved evidence
pub fn default_retrieve_max_distance() -> f32 {
    0.25
}

/// Default minimum factsheet word count
pub fn default_generate_min_words() -> usize {
    600
}

/// Default maximum factsheet word count
pub fn default_generate_max_words() -> usize {
    1000
}

/// Default target word count for the first draft
pub fn default_generate_target_words() -> usize {
    800
}

/// Default retries when the word count misses the window
pub fn default_generate_max_retries() -> usize {
    2
}

/// Default maximum concurrent ingestion workers
pub fn default_max_concurrent() -> usize {
    5
}

/// Default checkpoint file path
pub fn default_checkpoint_file() -> std::path::PathBuf {
    std::path::PathBuf::from("checkpoint.json")
}

/// Default factsheet output directory
pub fn default_output_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("factsheets")
}

/// Default extracted-content cache directory
pub fn default_extracted_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("extracted")
}

/// Default templates directory
pub fn default_templates_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("templates")
}
