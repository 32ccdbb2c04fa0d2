use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::config::{ConfigError, EmbeddingConfig};

use super::chat_completions::parse_provider_error_code;
use super::gateway::{EmbeddingProvider, LlmGatewayError, ProviderFuture};

/// OpenAI-compatible `/embeddings` client.
#[derive(Clone)]
pub struct EmbeddingsClient {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl EmbeddingsClient {
    pub fn new(config: EmbeddingConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;

        Ok(Self { client, config })
    }

    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>, LlmGatewayError> {
        let response = self
            .client
            .post(&self.config.embeddings_url)
            .bearer_auth(&self.config.api_key)
            .json(&json!({
                "input": text,
                "model": self.config.model,
            }))
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    LlmGatewayError::Timeout
                } else {
                    LlmGatewayError::ProviderFailure("request_unavailable".to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|_| {
            LlmGatewayError::InvalidProviderPayload("response_body_read_failed".to_string())
        })?;

        if !status.is_success() {
            return Err(LlmGatewayError::ProviderFailure(format!(
                "status={} code={}",
                status.as_u16(),
                parse_provider_error_code(&body)
            )));
        }

        let parsed: EmbeddingsResponse = serde_json::from_str(&body).map_err(|_| {
            LlmGatewayError::InvalidProviderPayload("response_json_parse_failed".to_string())
        })?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| LlmGatewayError::InvalidProviderPayload("missing_embedding".to_string()))
    }
}

impl EmbeddingProvider for EmbeddingsClient {
    fn embed<'a>(&'a self, text: &'a str) -> ProviderFuture<'a, Vec<f32>> {
        Box::pin(self.request_embedding(text))
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

/// Embeds `text`, substituting a zero vector of the provider's
/// dimensionality when the call fails or returns the wrong size.
pub async fn embed_or_zero<P>(provider: &P, text: &str) -> Vec<f32>
where
    P: EmbeddingProvider + ?Sized,
{
    let dimensions = provider.dimensions();
    match provider.embed(text).await {
        Ok(embedding) if embedding.len() == dimensions => embedding,
        Ok(embedding) => {
            warn!(
                expected = dimensions,
                actual = embedding.len(),
                "embedding has unexpected dimensionality, using zero vector"
            );
            vec![0.0; dimensions]
        }
        Err(err) => {
            warn!(error = %err, "embedding failed, using zero vector");
            vec![0.0; dimensions]
        }
    }
}
