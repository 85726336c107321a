//! OpenAI-compatible `/v1/embeddings` adapter.

use std::time::Duration;

use async_trait::async_trait;
use propsearch_core::config::EmbeddingSettings;
use propsearch_core::error::{Error, ProviderError, Result};
use propsearch_core::traits::EmbedProvider;
use serde::{Deserialize, Serialize};

pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dim: usize,
    id: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dim: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("embedding HTTP client: {e}")))?;
        let model = model.into();
        let id = format!("openai:{model}:d{dim}");
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model,
            dim,
            id,
        })
    }

    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let key = settings
            .api_key
            .clone()
            .ok_or_else(|| Error::InvalidConfig("embedding.api_key is not set".into()))?;
        Self::new(&settings.endpoint, key, &settings.model, settings.dimensions, settings.timeout())
    }

    /// Only the v3 embedding models accept a `dimensions` override.
    fn requested_dimensions(&self) -> Option<usize> {
        self.model.starts_with("text-embedding-3").then_some(self.dim)
    }

    fn map_http_error(status: reqwest::StatusCode, body: &str) -> ProviderError {
        let message = extract_error_message(body);
        match status.as_u16() {
            401 | 403 => ProviderError::Auth(message),
            400 | 404 | 422 => ProviderError::Malformed(message),
            429 => ProviderError::RateLimited(message),
            s if s >= 500 => ProviderError::Unavailable(format!("HTTP {s}: {message}")),
            s => ProviderError::Malformed(format!("HTTP {s}: {message}")),
        }
    }
}

fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Unavailable(e.to_string())
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| {
            if body.is_empty() {
                "no response body".to_string()
            } else {
                body.chars().take(500).collect()
            }
        })
}

#[async_trait]
impl EmbedProvider for OpenAiProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbeddingRequest { model: &self.model, input: texts, dimensions: self.requested_dimensions() };
        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::map_http_error(status, &text));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| if e.is_timeout() { map_transport_error(e) } else {
                ProviderError::Unavailable(format!("undecodable embeddings response: {e}"))
            })?;

        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        if data.iter().enumerate().any(|(i, d)| d.index != i) {
            return Err(ProviderError::Unavailable("embeddings response has gaps in `index`".into()));
        }
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}
