//! Embedding/completion provider abstraction
//!
//! This module isolates the external model provider behind a trait:
//! - batch text embedding with token usage
//! - chat-style completion with token usage
//! - an HTTP backend for OpenAI-compatible APIs
//! - cost arithmetic and pacing for provider calls

mod http;

pub use http::*;

use crate::config::ProviderConfig;
use crate::error::Result;
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;

/// A batch of embeddings plus the token usage the provider reported
#[derive(Debug, Clone)]
pub struct EmbeddingBatch {
    pub vectors: Vec<Vec<f32>>,
    pub tokens: u64,
}

/// One completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// One completion result with token usage
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Trait for embedding/completion providers
#[async_trait]
pub trait Provider: Send + Sync {
    /// Embed a batch of texts
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch>;

    /// Run one chat-style completion
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;

    /// Get the completion model name
    fn model_name(&self) -> &str;
}

/// Helper to embed in batches, concatenating vectors and summing usage
pub async fn embed_in_batches(
    provider: &dyn Provider,
    texts: &[String],
    batch_size: usize,
) -> Result<EmbeddingBatch> {
    let mut vectors = Vec::with_capacity(texts.len());
    let mut tokens = 0u64;

    for chunk in texts.chunks(batch_size.max(1)) {
        let batch = provider.embed(chunk).await?;
        vectors.extend(batch.vectors);
        tokens += batch.tokens;
    }

    Ok(EmbeddingBatch { vectors, tokens })
}

/// Rough token estimate for when the provider omits usage (1 token ≈ 4 chars)
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() / 4) as u64
}

/// Per-token pricing for provider calls
#[derive(Debug, Clone, Copy)]
pub struct CostModel {
    embedding_per_1k: f64,
    completion_input_per_1k: f64,
    completion_output_per_1k: f64,
}

impl CostModel {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            embedding_per_1k: config.embedding_price_per_1k,
            completion_input_per_1k: config.completion_input_price_per_1k,
            completion_output_per_1k: config.completion_output_price_per_1k,
        }
    }

    pub fn embedding_cost(&self, tokens: u64) -> f64 {
        (tokens as f64 / 1000.0) * self.embedding_per_1k
    }

    pub fn completion_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1000.0) * self.completion_input_per_1k
            + (output_tokens as f64 / 1000.0) * self.completion_output_per_1k
    }
}

/// Enforces a pause between completion calls so sequential generation
/// stays under the provider's rate limits.
pub struct CallPacer {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl CallPacer {
    pub fn new(calls_per_second: u32) -> Self {
        let rate = NonZeroU32::new(calls_per_second).unwrap_or(nonzero!(1u32));
        // Burst of one: every call after the first waits out the interval.
        let quota = Quota::per_second(rate).allow_burst(nonzero!(1u32));
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Wait until the next call is allowed
    pub async fn pause(&self) {
        self.limiter.until_ready().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn test_cost_model() {
        let model = CostModel {
            embedding_per_1k: 0.00002,
            completion_input_per_1k: 0.03,
            completion_output_per_1k: 0.06,
        };

        assert!((model.embedding_cost(1000) - 0.00002).abs() < 1e-12);
        assert!((model.completion_cost(1000, 1000) - 0.09).abs() < 1e-12);
        assert_eq!(model.completion_cost(0, 0), 0.0);
    }

    #[tokio::test]
    async fn test_call_pacer_enforces_interval() {
        use std::time::{Duration, Instant};

        let pacer = CallPacer::new(10); // 100ms between calls
        let start = Instant::now();
        pacer.pause().await;
        pacer.pause().await;
        pacer.pause().await;

        // Two intervals must have elapsed for three calls.
        assert!(start.elapsed() >= Duration::from_millis(180));
    }
}
