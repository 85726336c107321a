use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use propsearch_core::config::{backoff_delay, EmbeddingSettings};
use propsearch_core::error::{Error, ProviderError, Result};
use propsearch_core::traits::EmbedProvider;
use tracing::{debug, warn};

use crate::cache::EmbeddingCache;
use crate::normalize::normalize;

/// Retry and batching knobs for provider calls.
#[derive(Debug, Clone, Copy)]
pub struct EmbedOptions {
    /// Bound on a single provider attempt.
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub batch_size: usize,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self::from(&EmbeddingSettings::default())
    }
}

impl From<&EmbeddingSettings> for EmbedOptions {
    fn from(s: &EmbeddingSettings) -> Self {
        Self {
            timeout: s.timeout(),
            max_retries: s.max_retries,
            base_delay: s.retry_base_delay(),
            batch_size: s.batch_size.max(1),
        }
    }
}

/// Cached, retrying front end over an [`EmbedProvider`].
#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbedProvider>,
    cache: EmbeddingCache,
    options: EmbedOptions,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbedProvider>, cache: EmbeddingCache, options: EmbedOptions) -> Self {
        Self { provider, cache, options }
    }

    pub fn from_settings(provider: Arc<dyn EmbedProvider>, settings: &EmbeddingSettings) -> Self {
        let cache = EmbeddingCache::new(settings.cache_capacity, settings.cache_ttl());
        Self::new(provider, cache, EmbedOptions::from(settings))
    }

    pub fn provider_id(&self) -> &str {
        self.provider.provider_id()
    }

    pub fn dim(&self) -> usize {
        self.provider.dim()
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn options(&self) -> &EmbedOptions {
        &self.options
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed_batch(&[text.to_string()]).await?;
        out.pop()
            .ok_or_else(|| Error::EmbeddingUnavailable("provider returned no vector".into()))
    }

    /// Embed many texts; output order matches input order.
    ///
    /// Inputs that normalize to the same key share one cache entry and one
    /// provider slot. Misses are fetched by a spawned task that writes into
    /// the shared cache, so the work survives if this future is dropped.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let keys: Vec<String> = texts.iter().map(|t| normalize(t)).collect();
        if keys.iter().any(String::is_empty) {
            return Err(Error::InvalidQuery("cannot embed empty text".into()));
        }

        let mut resolved: HashMap<String, Arc<Vec<f32>>> = HashMap::with_capacity(keys.len());
        let mut misses: Vec<String> = Vec::new();
        for key in &keys {
            if resolved.contains_key(key) || misses.contains(key) {
                continue;
            }
            match self.cache.get(key).await {
                Some(v) => {
                    resolved.insert(key.clone(), v);
                }
                None => misses.push(key.clone()),
            }
        }
        debug!(
            provider = self.provider.provider_id(),
            inputs = keys.len(),
            hits = resolved.len(),
            misses = misses.len(),
            "embedding cache lookup"
        );

        if !misses.is_empty() {
            let task = tokio::spawn(fetch_and_cache(
                Arc::clone(&self.provider),
                self.cache.clone(),
                misses,
                self.options,
            ));
            let fetched = task
                .await
                .map_err(|e| Error::EmbeddingUnavailable(format!("embedding task failed: {e}")))??;
            resolved.extend(fetched);
        }

        keys.iter()
            .map(|k| {
                resolved
                    .get(k)
                    .map(|v| v.as_ref().clone())
                    .ok_or_else(|| Error::EmbeddingUnavailable(format!("no vector for '{k}'")))
            })
            .collect()
    }
}

async fn fetch_and_cache(
    provider: Arc<dyn EmbedProvider>,
    cache: EmbeddingCache,
    keys: Vec<String>,
    options: EmbedOptions,
) -> Result<Vec<(String, Arc<Vec<f32>>)>> {
    let dim = provider.dim();
    let mut out = Vec::with_capacity(keys.len());
    for chunk in keys.chunks(options.batch_size.max(1)) {
        let vectors = call_with_retry(provider.as_ref(), chunk, &options).await?;
        if vectors.len() != chunk.len() {
            return Err(Error::EmbeddingUnavailable(format!(
                "provider returned {} vectors for {} inputs",
                vectors.len(),
                chunk.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(Error::EmbeddingUnavailable(format!(
                "provider returned dimension {}, expected {dim}",
                bad.len()
            )));
        }
        for (key, vector) in chunk.iter().zip(vectors) {
            let vector = Arc::new(vector);
            cache.insert(key.clone(), Arc::clone(&vector)).await;
            out.push((key.clone(), vector));
        }
    }
    Ok(out)
}

async fn call_with_retry(
    provider: &dyn EmbedProvider,
    chunk: &[String],
    options: &EmbedOptions,
) -> Result<Vec<Vec<f32>>> {
    let mut attempt: u32 = 0;
    loop {
        let result = match tokio::time::timeout(options.timeout, provider.embed_batch(chunk)).await {
            Ok(r) => r,
            Err(_) => Err(ProviderError::Timeout(format!("no response within {}ms", options.timeout.as_millis()))),
        };
        match result {
            Ok(vectors) => return Ok(vectors),
            Err(e) if e.is_transient() && attempt < options.max_retries => {
                let delay = backoff_delay(options.base_delay, attempt);
                warn!(
                    provider = provider.provider_id(),
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "embedding attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(Error::EmbeddingUnavailable(format!(
                    "{e} (after {} attempt(s))",
                    attempt + 1
                )));
            }
        }
    }
}
