use async_trait::async_trait;

use crate::error::{ProviderError, Result};
use crate::filters::FilterSet;
use crate::types::{CandidateResult, Listing, ListingId};

/// Text-to-vector capability backed by an external model provider.
#[async_trait]
pub trait EmbedProvider: Send + Sync {
    /// Stable identifier for the provider/model (e.g., `openai:text-embedding-3-small:d1536`).
    fn provider_id(&self) -> &str;
    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;
    /// One vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, ProviderError>;
}

/// Filtered lexical and k-NN retrieval against the document store.
///
/// Both methods push `filters` down to the store, so every candidate
/// already satisfies the hard filters.
#[async_trait]
pub trait ListingIndex: Send + Sync {
    async fn search_lexical(&self, phrase: &str, filters: &FilterSet, limit: usize) -> Result<Vec<CandidateResult>>;
    async fn search_semantic(&self, vector: &[f32], filters: &FilterSet, limit: usize) -> Result<Vec<CandidateResult>>;
}

/// Batched record lookup used to hydrate fused ids.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Ids that no longer exist are absent from the output; order is unspecified.
    async fn get_many(&self, ids: &[ListingId]) -> Result<Vec<Listing>>;
}

/// Location autocomplete over the listings in the store.
#[async_trait]
pub trait LocationSuggester: Send + Sync {
    /// Distinct city and neighborhood names containing `partial`
    /// (case-insensitive), most common first, cities before neighborhoods.
    async fn suggest_locations(&self, partial: &str, limit: usize) -> Result<Vec<String>>;
}
