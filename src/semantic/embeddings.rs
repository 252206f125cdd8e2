//! Embedding client for a remote embedding API.
//!
//! Provides a high-level interface for generating embeddings:
//! - Input validation and length capping
//! - Retry with exponential backoff on transient failures
//! - Output dimension validation
//! - Batch embedding with bounded concurrency

use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::SemanticSearchConfig;
use crate::semantic::preprocess::truncate_chars;
use crate::semantic::retry::{is_transient_error, with_retry, RetryPolicy};

/// Dimensions produced by the default embedding model
pub const EMBEDDING_DIMENSIONS: usize = 1536;

/// Maximum embedding input length (characters, not tokens)
pub const EMBEDDING_MAX_LENGTH: usize = 8000;

/// Default number of concurrent requests per batch chunk
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default per-request timeout
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Raw result of one provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEmbedding {
    pub vector: Vec<f32>,
    pub total_tokens: Option<u32>,
}

/// Failure reported by an embedding provider.
///
/// The display strings are what the retry policy inspects, so transient
/// variants must mention their condition (`timeout`, `network`, status code).
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timeout: {0}")]
    Timeout(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        is_transient_error(&self.to_string())
    }
}

/// A remote embedding API. One call embeds one input.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, input: &str) -> impl Future<Output = Result<ProviderEmbedding, ProviderError>> + Send;
}

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("empty input")]
    EmptyInput,

    #[error("invalid dimensions: expected {expected}, got {got}")]
    InvalidDimensions { expected: usize, got: usize },

    #[error("embedding request failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("client initialization failed: {0}")]
    InitFailed(String),
}

/// A validated embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub token_count: Option<u32>,
    pub duration_ms: u64,
}

/// Outcome of a batch. `vectors` is index-aligned with the input texts;
/// `None` marks an item that failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchEmbedding {
    pub vectors: Vec<Option<Vec<f32>>>,
    pub total_tokens: u64,
    /// Wall-clock time for the whole batch.
    pub total_duration_ms: u64,
    pub success_count: usize,
    pub failure_count: usize,
    /// Items that were sent to the provider. Empty inputs are rejected
    /// locally and not counted.
    pub request_count: usize,
}

/// Embedding client over any [`EmbeddingProvider`].
pub struct EmbeddingClient<P> {
    provider: P,
    dimensions: usize,
    max_input_length: usize,
    retry: RetryPolicy,
}

impl<P: EmbeddingProvider> EmbeddingClient<P> {
    pub fn new(provider: P, dimensions: usize, max_input_length: usize, retry: RetryPolicy) -> Self {
        Self {
            provider,
            dimensions,
            max_input_length,
            retry,
        }
    }

    pub fn from_config(provider: P, config: &SemanticSearchConfig) -> Self {
        Self::new(
            provider,
            config.dimensions,
            config.max_input_length,
            RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.retry_base_delay_ms),
            ),
        )
    }

    /// Get the embedding dimensions this client enforces
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Get the maximum input length in characters
    pub fn max_input_length(&self) -> usize {
        self.max_input_length
    }

    #[cfg(test)]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Generate an embedding for a single text.
    pub async fn embed_one(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let input = truncate_chars(text, self.max_input_length);
        let start = Instant::now();

        let response = with_retry(
            &self.retry,
            || self.provider.embed(&input),
            ProviderError::is_transient,
        )
        .await?;

        if response.vector.len() != self.dimensions {
            return Err(EmbeddingError::InvalidDimensions {
                expected: self.dimensions,
                got: response.vector.len(),
            });
        }

        Ok(Embedding {
            vector: response.vector,
            token_count: response.total_tokens,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Generate embeddings for multiple texts.
    ///
    /// Texts are processed in chunks of `concurrency`; a chunk's requests run
    /// concurrently and the next chunk starts only once all of them settled.
    /// A failed item never aborts the batch.
    pub async fn embed_batch(&self, texts: &[String], concurrency: usize) -> BatchEmbedding {
        let start = Instant::now();
        let mut batch = BatchEmbedding {
            vectors: Vec::with_capacity(texts.len()),
            ..Default::default()
        };

        for chunk in texts.chunks(concurrency.max(1)) {
            let results =
                futures::future::join_all(chunk.iter().map(|text| self.embed_one(text))).await;

            for result in results {
                match result {
                    Ok(embedding) => {
                        batch.request_count += 1;
                        batch.total_tokens += u64::from(embedding.token_count.unwrap_or(0));
                        batch.success_count += 1;
                        batch.vectors.push(Some(embedding.vector));
                    }
                    Err(e) => {
                        if !matches!(e, EmbeddingError::EmptyInput) {
                            batch.request_count += 1;
                        }
                        log::warn!("embedding failed for batch item {}: {e}", batch.vectors.len());
                        batch.failure_count += 1;
                        batch.vectors.push(None);
                    }
                }
            }
        }

        batch.total_duration_ms = start.elapsed().as_millis() as u64;
        batch
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<EmbeddingUsage>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingUsage {
    total_tokens: u32,
}

/// OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OpenAiEmbeddings {
    pub fn new(config: &SemanticSearchConfig, api_key: &str) -> Result<Self, EmbeddingError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth = reqwest::header::HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| EmbeddingError::InitFailed(format!("invalid api key: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn map_transport_error(err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, input: &str) -> Result<ProviderEmbedding, ProviderError> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input,
            encoding_format: "float",
        };

        log::debug!("embedding request model={} chars={}", self.model, input.chars().count());

        let resp = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: EmbeddingResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Malformed(e.to_string())
            }
        })?;

        let vector = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ProviderError::Malformed("no embedding returned".to_string()))?;

        Ok(ProviderEmbedding {
            vector,
            total_tokens: body.usage.map(|u| u.total_tokens),
        })
    }
}
