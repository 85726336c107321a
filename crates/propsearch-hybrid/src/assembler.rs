use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use propsearch_core::config::CacheSettings;
use propsearch_core::error::{Error, Result};
use propsearch_core::traits::ListingStore;
use propsearch_core::types::{FusedResult, Listing, ListingHit, ListingId, PageRequest, SortDirection, SortField, SortOrder};
use tracing::{debug, warn};

/// One page of hydrated hits.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPage {
    pub hits: Vec<ListingHit>,
    /// Fused ids that could not be resolved and were left out.
    pub dropped: usize,
    pub missing: Vec<ListingId>,
}

/// Turns fused ids into listings, applies any sort override, then paginates.
///
/// Resolved listings are kept in a bounded TTL cache; cached copies carry no
/// embedding.
#[derive(Clone)]
pub struct ResultAssembler {
    store: Arc<dyn ListingStore>,
    cache: Cache<ListingId, Arc<Listing>>,
}

impl ResultAssembler {
    pub fn new(store: Arc<dyn ListingStore>, capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(capacity).time_to_live(ttl).build();
        Self { store, cache }
    }

    pub fn from_settings(store: Arc<dyn ListingStore>, settings: &CacheSettings) -> Self {
        Self::new(store, settings.listing_capacity, settings.listing_ttl())
    }

    /// Resolve ids through the cache, fetching every miss in one batch.
    /// Returns the resolved listings and the ids the store did not know.
    async fn hydrate(&self, ids: &[ListingId]) -> Result<(HashMap<ListingId, Arc<Listing>>, Vec<ListingId>)> {
        let mut found = HashMap::with_capacity(ids.len());
        let mut misses = Vec::new();
        for id in ids {
            match self.cache.get(id).await {
                Some(l) => { found.insert(id.clone(), l); }
                None => misses.push(id.clone()),
            }
        }
        debug!(requested = ids.len(), cached = found.len(), misses = misses.len(), "hydrating listings");

        if !misses.is_empty() {
            for mut listing in self.store.get_many(&misses).await? {
                if !misses.contains(&listing.id) {
                    continue;
                }
                listing.embedding = None;
                let listing = Arc::new(listing);
                self.cache.insert(listing.id.clone(), Arc::clone(&listing)).await;
                found.insert(listing.id.clone(), listing);
            }
        }
        let missing = ids.iter().filter(|id| !found.contains_key(*id)).cloned().collect();
        Ok((found, missing))
    }

    /// Build one page from a ranked fused list.
    ///
    /// With relevance order only the requested slice is hydrated. Any other
    /// order hydrates the whole list, re-sorts it and then slices.
    pub async fn assemble(&self, fused: &[FusedResult], page: PageRequest, sort: SortOrder) -> Result<AssembledPage> {
        let pool: &[FusedResult] = if sort.is_relevance() {
            let start = page.offset.min(fused.len());
            let end = page.window().min(fused.len());
            &fused[start..end]
        } else {
            fused
        };
        let ids: Vec<ListingId> = pool.iter().map(|r| r.id.clone()).collect();
        let (found, missing) = self.hydrate(&ids).await?;
        if !missing.is_empty() {
            let err = Error::PartialResult { missing: missing.clone() };
            warn!(missing = ?missing, "{err}");
        }

        let mut hits: Vec<ListingHit> = pool.iter()
            .filter_map(|r| found.get(&r.id).map(|l| ListingHit {
                score: r.score,
                rank: r.rank,
                sources: r.sources.clone(),
                listing: l.as_ref().clone(),
            }))
            .collect();

        if !sort.is_relevance() {
            sort_hits(&mut hits, sort);
            hits = hits.into_iter().skip(page.offset).take(page.limit).collect();
        }
        let first = page.offset + 1;
        for (i, hit) in hits.iter_mut().enumerate() {
            hit.rank = first + i;
        }
        Ok(AssembledPage { hits, dropped: missing.len(), missing })
    }

    /// Single listing by id, cache first.
    pub async fn get_listing(&self, id: &str) -> Result<Option<Listing>> {
        let ids = [id.to_string()];
        let (found, _) = self.hydrate(&ids).await?;
        Ok(found.get(id).map(|l| l.as_ref().clone()))
    }

    /// Drop a listing from the cache after it was edited or removed.
    pub async fn invalidate(&self, id: &str) {
        self.cache.invalidate(id).await;
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    pub async fn cached_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

fn sort_key(listing: &Listing, field: SortField) -> Option<f64> {
    match field {
        SortField::Relevance => None,
        SortField::Price => Some(listing.price),
        SortField::Bedrooms => Some(f64::from(listing.bedrooms)),
        SortField::SquareFeet => listing.square_feet.map(f64::from),
        SortField::Date => listing.listed_at.map(|d| d.timestamp_millis() as f64),
    }
}

/// Stable sort by attribute; listings without the attribute go last in
/// either direction.
fn sort_hits(hits: &mut [ListingHit], sort: SortOrder) {
    hits.sort_by(|a, b| {
        match (sort_key(&a.listing, sort.field), sort_key(&b.listing, sort.field)) {
            (Some(x), Some(y)) => match sort.direction {
                SortDirection::Asc => x.total_cmp(&y),
                SortDirection::Desc => y.total_cmp(&x),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}
