//! Request orchestration.
//!
//! A search runs the lexical sub-query and the embed-then-semantic path
//! concurrently, joins both, fuses, then hands the ranked ids to the
//! [`ResultAssembler`]. Only the lexical path is required; the semantic path
//! degrades to lexical-only.

use std::sync::Arc;
use std::time::{Duration, Instant};

use propsearch_core::config::Settings;
use propsearch_core::error::{Error, Result};
use propsearch_core::traits::{ListingIndex, ListingStore};
use propsearch_core::types::{CandidateResult, Degradation, Listing, PageRequest, Query, SearchRequest, SearchResponse};
use propsearch_embed::EmbeddingClient;
use propsearch_query::interpret;
use tracing::{debug, info, warn};

use crate::assembler::ResultAssembler;
use crate::fusion::{fuse, FusionWeights};

#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub weights: FusionWeights,
    pub over_fetch_factor: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Per index call (lexical, semantic, hydration).
    pub index_timeout: Duration,
    /// All embedding attempts plus backoff.
    pub embedding_budget: Duration,
    pub overhead: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            weights: FusionWeights::default(),
            over_fetch_factor: 3,
            default_page_size: 10,
            max_page_size: 100,
            index_timeout: Duration::from_secs(2),
            embedding_budget: Duration::from_secs(10),
            overhead: Duration::from_millis(250),
        }
    }
}

impl EngineOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let search = &settings.search;
        Ok(Self {
            weights: FusionWeights::from_settings(search)?,
            over_fetch_factor: search.over_fetch_factor.max(1),
            default_page_size: search.default_page_size,
            max_page_size: search.max_page_size,
            index_timeout: settings.store.timeout(),
            embedding_budget: settings.embedding.budget(),
            overhead: Duration::from_millis(search.overhead_ms),
        })
    }

    /// Upper bound for one whole request: the slower of the two paths,
    /// then hydration, then fixed overhead.
    pub fn request_timeout(&self) -> Duration {
        let paths = self.index_timeout.max(self.embedding_budget + self.index_timeout);
        paths + self.index_timeout + self.overhead
    }
}

pub struct HybridSearchEngine {
    index: Arc<dyn ListingIndex>,
    embedder: EmbeddingClient,
    assembler: ResultAssembler,
    options: EngineOptions,
}

/// Why the semantic path produced nothing.
type SemanticFailure = (Degradation, Error);

impl HybridSearchEngine {
    pub fn new(index: Arc<dyn ListingIndex>, embedder: EmbeddingClient, assembler: ResultAssembler, options: EngineOptions) -> Self {
        Self { index, embedder, assembler, options }
    }

    pub fn from_settings(
        index: Arc<dyn ListingIndex>,
        store: Arc<dyn ListingStore>,
        embedder: EmbeddingClient,
        settings: &Settings,
    ) -> Result<Self> {
        let assembler = ResultAssembler::from_settings(store, &settings.cache);
        Ok(Self::new(index, embedder, assembler, EngineOptions::from_settings(settings)?))
    }

    pub fn options(&self) -> &EngineOptions { &self.options }

    pub fn embedder(&self) -> &EmbeddingClient { &self.embedder }

    pub fn assembler(&self) -> &ResultAssembler { &self.assembler }

    pub async fn get_listing(&self, id: &str) -> Result<Option<Listing>> {
        self.with_index_timeout("get_listing", self.assembler.get_listing(id)).await
    }

    /// Run one search request under the aggregate request timeout.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let limit = self.options.request_timeout();
        match tokio::time::timeout(limit, self.run(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!("search exceeded {} ms", limit.as_millis()))),
        }
    }

    fn page_request(&self, request: &SearchRequest) -> Result<(usize, PageRequest)> {
        let page = request.page.unwrap_or(1);
        let page_size = request.page_size.unwrap_or(self.options.default_page_size);
        if page_size > self.options.max_page_size {
            return Err(Error::InvalidQuery(format!(
                "pageSize must be in 1..={}, got {page_size}",
                self.options.max_page_size
            )));
        }
        Ok((page, PageRequest::from_page(page, page_size)?))
    }

    async fn run(&self, request: SearchRequest) -> Result<SearchResponse> {
        let started = Instant::now();
        let (page_number, page) = self.page_request(&request)?;
        let sort = request.sort.unwrap_or_default();
        let query = interpret(&request.text, request.filters.as_ref())?.with_page(page).with_sort(sort);

        let pool_limit = page.window().saturating_mul(self.options.over_fetch_factor);
        let (lexical, semantic) = tokio::join!(
            self.with_index_timeout("lexical search", self.index.search_lexical(&query.phrase, &query.filters, pool_limit)),
            self.semantic_path(&query, pool_limit),
        );
        let lexical = lexical?;
        let (semantic, degradation) = match semantic {
            Ok(hits) => (hits, None),
            Err((reason, err)) => {
                warn!(reason = ?reason, error = %err, "semantic path failed, serving lexical-only");
                (Vec::new(), Some(reason))
            }
        };
        debug!(lexical = lexical.len(), semantic = semantic.len(), "sub-queries joined");

        let mut fused = fuse(&lexical, &semantic, self.options.weights);
        let pool = fused.len();
        if sort.is_relevance() {
            fused.truncate(page.window());
        }

        let assembled = self
            .with_index_timeout("hydration", self.assembler.assemble(&fused, page, sort))
            .await?;
        let total_estimate = pool.saturating_sub(assembled.dropped);
        let took_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            results = assembled.hits.len(),
            total = total_estimate,
            dropped = assembled.dropped,
            degraded = degradation.is_some(),
            took_ms,
            "search complete"
        );

        Ok(SearchResponse {
            results: assembled.hits,
            total_estimate,
            total_pages: total_estimate.div_ceil(page.limit),
            page: page_number,
            page_size: page.limit,
            took_ms,
            degraded: degradation.is_some(),
            degradation,
            dropped: assembled.dropped,
        })
    }

    async fn semantic_path(&self, query: &Query, limit: usize) -> std::result::Result<Vec<CandidateResult>, SemanticFailure> {
        if !query.has_phrase() {
            return Ok(Vec::new());
        }
        let vector = self
            .embedder
            .embed(&query.phrase)
            .await
            .map_err(|e| (Degradation::EmbeddingUnavailable, e))?;
        self.with_index_timeout("semantic search", self.index.search_semantic(&vector, &query.filters, limit))
            .await
            .map_err(|e| (Degradation::SemanticIndexUnavailable, e))
    }

    async fn with_index_timeout<T>(&self, what: &str, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.options.index_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::IndexUnavailable(format!(
                "{what} timed out after {} ms",
                self.options.index_timeout.as_millis()
            ))),
        }
    }
}
