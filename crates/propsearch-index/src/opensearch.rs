use async_trait::async_trait;
use propsearch_core::config::StoreSettings;
use propsearch_core::error::{Error, Result};
use propsearch_core::traits::{ListingIndex, ListingStore, LocationSuggester};
use propsearch_core::types::{CandidateResult, Listing, ListingId, SourceKind};
use propsearch_core::FilterSet;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::document::ListingDocument;
use crate::dsl;
use crate::suggest::{check_partial, merge_suggestions, PlaceCount};

/// OpenSearch-backed [`ListingIndex`] and [`ListingStore`].
///
/// Every failure (transport, timeout, non-2xx, undecodable body) surfaces
/// as [`Error::IndexUnavailable`].
pub struct OpenSearchClient {
    client: reqwest::Client,
    base_url: String,
    index: String,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHealth {
    pub version: String,
    pub cluster_name: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f32>,
}

#[derive(Deserialize)]
struct MgetResponse {
    docs: Vec<MgetDoc>,
}

#[derive(Deserialize)]
struct MgetDoc {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source", default)]
    source: Option<Value>,
}

#[derive(Deserialize)]
struct SuggestResponse {
    aggregations: SuggestAggregations,
}

#[derive(Deserialize)]
struct SuggestAggregations {
    unique_cities: TermsAgg,
    unique_neighborhoods: TermsAgg,
}

#[derive(Deserialize)]
struct TermsAgg {
    buckets: Vec<TermsBucket>,
}

#[derive(Deserialize)]
struct TermsBucket {
    key: String,
    doc_count: u64,
}

impl TermsAgg {
    fn into_counts(self) -> Vec<PlaceCount> {
        self.buckets.into_iter().map(|b| PlaceCount::new(b.key, b.doc_count)).collect()
    }
}

#[derive(Deserialize)]
struct InfoResponse {
    #[serde(default)]
    cluster_name: Option<String>,
    version: InfoVersion,
}

#[derive(Deserialize)]
struct InfoVersion {
    number: String,
}

impl OpenSearchClient {
    pub fn new(settings: &StoreSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| Error::InvalidConfig(format!("store HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: settings.endpoint.trim_end_matches('/').to_string(),
            index: settings.index.clone(),
            username: settings.username.clone(),
            password: settings.password.clone(),
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let req = self.client.request(method, format!("{}{}", self.base_url, path));
        match &self.username {
            Some(user) => req.basic_auth(user, self.password.as_deref()),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder, what: &str) -> Result<T> {
        let response = req
            .send()
            .await
            .map_err(|e| Error::IndexUnavailable(format!("{what}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail: String = body.chars().take(300).collect();
            return Err(Error::IndexUnavailable(format!("{what}: HTTP {}: {detail}", status.as_u16())));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| Error::IndexUnavailable(format!("{what}: undecodable response: {e}")))
    }

    async fn search(&self, body: Value, source: SourceKind) -> Result<Vec<CandidateResult>> {
        let path = format!("/{}/_search", self.index);
        let what = match source {
            SourceKind::Lexical => "lexical search",
            SourceKind::Semantic => "semantic search",
        };
        let parsed: SearchResponse = self.send(self.request(reqwest::Method::POST, &path).json(&body), what).await?;
        let candidates: Vec<CandidateResult> = parsed
            .hits
            .hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| CandidateResult::new(hit.id, source, hit.score.unwrap_or(0.0), i + 1))
            .collect();
        debug!(index = %self.index, source = ?source, hits = candidates.len(), "store search complete");
        Ok(candidates)
    }

    /// Cluster version, as reported by the store's root endpoint.
    pub async fn health(&self) -> Result<StoreHealth> {
        let info: InfoResponse = self.send(self.request(reqwest::Method::GET, "/"), "health").await?;
        Ok(StoreHealth { version: info.version.number, cluster_name: info.cluster_name })
    }
}

#[async_trait]
impl ListingIndex for OpenSearchClient {
    async fn search_lexical(&self, phrase: &str, filters: &FilterSet, limit: usize) -> Result<Vec<CandidateResult>> {
        self.search(dsl::lexical_query(phrase, filters, limit), SourceKind::Lexical).await
    }

    async fn search_semantic(&self, vector: &[f32], filters: &FilterSet, limit: usize) -> Result<Vec<CandidateResult>> {
        self.search(dsl::knn_query(vector, filters, limit), SourceKind::Semantic).await
    }
}

#[async_trait]
impl ListingStore for OpenSearchClient {
    async fn get_many(&self, ids: &[ListingId]) -> Result<Vec<Listing>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let path = format!("/{}/_mget", self.index);
        let parsed: MgetResponse = self
            .send(self.request(reqwest::Method::POST, &path).json(&dsl::mget_body(ids)), "get_many")
            .await?;
        let mut listings = Vec::with_capacity(parsed.docs.len());
        for doc in parsed.docs {
            let Some(source) = doc.source.filter(|_| doc.found) else { continue };
            let decoded = serde_json::from_value::<ListingDocument>(source)
                .map_err(|e| e.to_string())
                .and_then(|d| d.into_listing(&doc.id));
            match decoded {
                Ok(listing) => listings.push(listing),
                Err(reason) => warn!(id = %doc.id, %reason, "skipping undecodable listing"),
            }
        }
        Ok(listings)
    }
}

#[async_trait]
impl LocationSuggester for OpenSearchClient {
    async fn suggest_locations(&self, partial: &str, limit: usize) -> Result<Vec<String>> {
        let partial = check_partial(partial)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let path = format!("/{}/_search", self.index);
        let parsed: SuggestResponse = self
            .send(
                self.request(reqwest::Method::POST, &path).json(&dsl::suggest_query(partial, limit)),
                "location suggestions",
            )
            .await?;
        let aggs = parsed.aggregations;
        Ok(merge_suggestions(
            partial,
            aggs.unique_cities.into_counts(),
            aggs.unique_neighborhoods.into_counts(),
            limit,
        ))
    }
}
