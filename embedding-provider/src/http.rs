use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{reject_empty, EmbedError, EmbeddingProvider};

/// Configuration for the HTTP-backed embedding provider. The wire format
/// is an internal detail (out of scope per the core contract) — an
/// OpenAI-style `{model, input}` request and `{data: [{embedding}]}`
/// response.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
    pub timeout: std::time::Duration,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Deserialize)]
struct EmbedDatum {
    embedding: Vec<f32>,
}

/// HTTP-backed embedder (enrichment: grounded in `reqwest`'s use as the
/// provider HTTP client across the rest of the example pack).
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    config: HttpEmbeddingConfig,
}

impl HttpEmbeddingProvider {
    pub fn new(config: HttpEmbeddingConfig) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbedError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&EmbedRequest {
                model: &self.config.model,
                input: batch,
            })
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(EmbedError::RateLimited);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(EmbedError::Unauthorized(format!("status {status}")));
        }
        if status.is_server_error() {
            return Err(EmbedError::Network(format!("status {status}")));
        }
        if !status.is_success() {
            return Err(EmbedError::Malformed(format!("unexpected status {status}")));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Malformed(e.to_string()))?;

        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        if vectors.len() != batch.len() {
            return Err(EmbedError::CountMismatch {
                expected: batch.len(),
                actual: vectors.len(),
            });
        }
        for vector in &vectors {
            if vector.len() != self.config.dimension {
                return Err(EmbedError::Malformed(format!(
                    "vector has dimension {}, expected {}",
                    vector.len(),
                    self.config.dimension
                )));
            }
        }
        Ok(vectors)
    }
}

fn classify_transport_error(err: reqwest::Error) -> EmbedError {
    EmbedError::Network(err.to_string())
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        reject_empty(texts)?;
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size.max(1)) {
            out.extend(self.embed_batch(batch).await?);
        }
        Ok(out)
    }
}
