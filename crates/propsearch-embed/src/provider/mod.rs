//! Embedding provider adapters.
//!
//! Providers must return vectors of exactly `dim()` floats, one per input,
//! in input order.

use std::sync::Arc;

use propsearch_core::config::Settings;
use propsearch_core::error::Result;
use propsearch_core::traits::EmbedProvider;
use tracing::info;

pub mod fake;
pub mod openai;

pub use fake::FakeProvider;
pub use openai::OpenAiProvider;

/// Pick the provider for these settings.
///
/// Falls back to [`FakeProvider`] when fake embeddings are requested
/// (`APP_USE_FAKE_EMBEDDINGS=1` or `use_fake_embeddings = true`) or no API key
/// is configured.
pub fn get_default_provider(settings: &Settings) -> Result<Arc<dyn EmbedProvider>> {
    let env_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let has_key = settings.embedding.api_key.as_deref().is_some_and(|k| !k.trim().is_empty());
    if env_fake || settings.use_fake_embeddings || !has_key {
        info!(dim = settings.embedding.dimensions, "using fake embedding provider");
        return Ok(Arc::new(FakeProvider::new(settings.embedding.dimensions)));
    }
    let provider = OpenAiProvider::from_settings(&settings.embedding)?;
    info!(provider = provider.provider_id(), "using remote embedding provider");
    Ok(Arc::new(provider))
}
