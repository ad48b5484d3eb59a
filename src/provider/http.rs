//! OpenAI-compatible HTTP provider backend

use super::{estimate_tokens, Completion, CompletionRequest, EmbeddingBatch, Provider};
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub struct HttpProvider {
    client: Client,
    base_url: String,
    api_key: String,
    embedding_model: String,
    completion_model: String,
    embedding_dimension: usize,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

impl HttpProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_key = config.api_key()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create provider client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            embedding_model: config.embedding_model.clone(),
            completion_model: config.completion_model.clone(),
            embedding_dimension: config.embedding_dimension,
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|e| Error::Config(format!("Invalid provider API key: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn validate_dimensions(&self, vectors: &[Vec<f32>]) -> Result<()> {
        if let Some(mismatch) = vectors.iter().find(|v| v.len() != self.embedding_dimension) {
            return Err(Error::Embedding(format!(
                "Embedding dimension mismatch for model '{}': expected {}, got {}",
                self.embedding_model,
                self.embedding_dimension,
                mismatch.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Provider for HttpProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        if texts.is_empty() {
            return Ok(EmbeddingBatch {
                vectors: Vec::new(),
                tokens: 0,
            });
        }

        debug!("Embedding {} texts", texts.len());

        let body = EmbeddingsRequest {
            model: &self.embedding_model,
            input: texts,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "provider returned {}: {}",
                status, text
            )));
        }

        let parsed: EmbeddingsResponse = response.json().await?;
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        self.validate_dimensions(&vectors)?;

        let tokens = parsed
            .usage
            .map(|u| u.total_tokens)
            .filter(|t| *t > 0)
            .unwrap_or_else(|| texts.iter().map(|t| estimate_tokens(t)).sum());

        Ok(EmbeddingBatch { vectors, tokens })
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        debug!(
            "Requesting completion from {} ({} prompt chars)",
            self.completion_model,
            request.prompt.len()
        );

        let body = ChatRequest {
            model: &self.completion_model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "provider returned {}: {}",
                status, text
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Generation("provider returned no choices".to_string()))?;

        let (input_tokens, output_tokens) = match parsed.usage {
            Some(usage) if usage.prompt_tokens > 0 || usage.completion_tokens > 0 => {
                (usage.prompt_tokens, usage.completion_tokens)
            }
            _ => (estimate_tokens(&request.prompt), estimate_tokens(&text)),
        };

        Ok(Completion {
            text,
            input_tokens,
            output_tokens,
        })
    }

    fn model_name(&self) -> &str {
        &self.completion_model
    }
}
