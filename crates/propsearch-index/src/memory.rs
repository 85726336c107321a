//! In-process listing backend.
//!
//! Lexical scoring is tantivy BM25 over an in-RAM index of title and body
//! text; semantic scoring is brute-force cosine similarity over the
//! listings' own embeddings. Filters are evaluated with [`FilterSet::matches`].

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use propsearch_core::error::{Error, Result};
use propsearch_core::traits::{ListingIndex, ListingStore, LocationSuggester};
use propsearch_core::types::{CandidateResult, Listing, ListingId, SourceKind};
use propsearch_core::FilterSet;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tracing::debug;

use crate::suggest::{check_partial, merge_suggestions, PlaceCount};
use crate::tantivy_utils::{build_schema, register_tokenizer};

fn index_err(e: tantivy::TantivyError) -> Error {
	Error::IndexUnavailable(format!("memory index: {e}"))
}

pub struct MemoryIndex {
	listings: HashMap<ListingId, Listing>,
	order: Vec<ListingId>,
	index: Index,
	reader: IndexReader,
	id_field: Field,
	title_field: Field,
	body_field: Field,
}

impl MemoryIndex {
	/// Build the index. A repeated id keeps the last listing.
	pub fn new(listings: Vec<Listing>) -> Result<Self> {
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let id_field = schema.get_field("id").map_err(index_err)?;
		let title_field = schema.get_field("title").map_err(index_err)?;
		let body_field = schema.get_field("body").map_err(index_err)?;

		let mut by_id = HashMap::with_capacity(listings.len());
		let mut order = Vec::with_capacity(listings.len());
		for l in listings {
			if !by_id.contains_key(&l.id) { order.push(l.id.clone()); }
			by_id.insert(l.id.clone(), l);
		}

		let mut writer: IndexWriter = index.writer_with_num_threads(1, 50_000_000).map_err(index_err)?;
		for id in &order {
			let Some(l) = by_id.get(id) else { continue };
			let body = [l.description.as_str(), l.location.address.as_str(), l.location.city.as_str(), l.location.neighborhood.as_deref().unwrap_or("")].join(" ");
			writer.add_document(doc!(
				id_field => l.id.clone(),
				title_field => l.title.clone(),
				body_field => body,
			)).map_err(index_err)?;
		}
		writer.commit().map_err(index_err)?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(index_err)?;

		debug!(listings = order.len(), "memory index built");
		Ok(Self { listings: by_id, order, index, reader, id_field, title_field, body_field })
	}

	pub fn len(&self) -> usize { self.order.len() }

	pub fn is_empty(&self) -> bool { self.order.is_empty() }

	pub fn get(&self, id: &str) -> Option<&Listing> { self.listings.get(id) }

	fn lexical(&self, phrase: &str, filters: &FilterSet, limit: usize) -> Result<Vec<CandidateResult>> {
		if phrase.trim().is_empty() {
			return Ok(self.order.iter()
				.filter_map(|id| self.listings.get(id))
				.filter(|l| filters.matches(l))
				.take(limit)
				.enumerate()
				.map(|(i, l)| CandidateResult::new(l.id.clone(), SourceKind::Lexical, 1.0, i + 1))
				.collect());
		}
		let mut query_parser = QueryParser::for_index(&self.index, vec![self.title_field, self.body_field]);
		query_parser.set_field_boost(self.title_field, 2.0);
		let (query, _errors) = query_parser.parse_query_lenient(phrase);
		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(self.len().max(1))).map_err(index_err)?;
		let mut out = Vec::new();
		for (score, address) in top_docs {
			if out.len() >= limit { break; }
			let doc: TantivyDocument = searcher.doc(address).map_err(index_err)?;
			let Some(id) = doc.get_first(self.id_field).and_then(|v| v.as_str()) else { continue };
			let Some(listing) = self.listings.get(id) else { continue };
			if !filters.matches(listing) { continue; }
			out.push(CandidateResult::new(id, SourceKind::Lexical, score, out.len() + 1));
		}
		Ok(out)
	}

	fn semantic(&self, vector: &[f32], filters: &FilterSet, limit: usize) -> Vec<CandidateResult> {
		let mut scored: Vec<(f32, &str)> = self.order.iter()
			.filter_map(|id| self.listings.get(id))
			.filter(|l| filters.matches(l))
			.filter_map(|l| {
				let emb = l.embedding.as_deref()?;
				cosine(vector, emb).map(|s| (s, l.id.as_str()))
			})
			.collect();
		scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
		scored.into_iter()
			.take(limit)
			.enumerate()
			.map(|(i, (score, id))| CandidateResult::new(id, SourceKind::Semantic, score, i + 1))
			.collect()
	}
}

fn place_counts<'a>(names: impl Iterator<Item = &'a str>) -> Vec<PlaceCount> {
	let mut counts: HashMap<&str, u64> = HashMap::new();
	for n in names.map(str::trim).filter(|n| !n.is_empty()) { *counts.entry(n).or_insert(0) += 1; }
	counts.into_iter().map(|(name, count)| PlaceCount::new(name, count)).collect()
}

/// Cosine similarity; `None` on dimension mismatch or a zero vector.
pub fn cosine(a: &[f32], b: &[f32]) -> Option<f32> {
	if a.len() != b.len() || a.is_empty() { return None; }
	let (mut dot, mut na, mut nb) = (0f32, 0f32, 0f32);
	for (x, y) in a.iter().zip(b) { dot += x * y; na += x * x; nb += y * y; }
	let denom = na.sqrt() * nb.sqrt();
	(denom > 0.0).then(|| dot / denom)
}

/// Read a JSON array of listings.
pub fn load_listings(path: &Path) -> Result<Vec<Listing>> {
	let raw = std::fs::read_to_string(path).map_err(|e| Error::InvalidConfig(format!("listings file {}: {e}", path.display())))?;
	serde_json::from_str(&raw).map_err(|e| Error::InvalidConfig(format!("listings file {}: {e}", path.display())))
}

#[async_trait]
impl ListingIndex for MemoryIndex {
	async fn search_lexical(&self, phrase: &str, filters: &FilterSet, limit: usize) -> Result<Vec<CandidateResult>> {
		self.lexical(phrase, filters, limit)
	}

	async fn search_semantic(&self, vector: &[f32], filters: &FilterSet, limit: usize) -> Result<Vec<CandidateResult>> {
		Ok(self.semantic(vector, filters, limit))
	}
}

#[async_trait]
impl ListingStore for MemoryIndex {
	async fn get_many(&self, ids: &[ListingId]) -> Result<Vec<Listing>> {
		Ok(ids.iter().filter_map(|id| self.listings.get(id).cloned()).collect())
	}
}

#[async_trait]
impl LocationSuggester for MemoryIndex {
	async fn suggest_locations(&self, partial: &str, limit: usize) -> Result<Vec<String>> {
		let partial = check_partial(partial)?;
		let listings = move || self.order.iter().filter_map(move |id| self.listings.get(id));
		let cities = place_counts(listings().map(|l| l.location.city.as_str()));
		let hoods = place_counts(listings().filter_map(|l| l.location.neighborhood.as_deref()));
		Ok(merge_suggestions(partial, cities, hoods, limit))
	}
}

#[cfg(test)]
mod tests {
	use super::cosine;

	#[test]
	fn cosine_bounds() {
		assert_eq!(cosine(&[1.0, 0.0], &[1.0, 0.0]), Some(1.0));
		assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), Some(0.0));
		assert_eq!(cosine(&[1.0], &[1.0, 2.0]), None);
		assert_eq!(cosine(&[0.0, 0.0], &[1.0, 2.0]), None);
	}
}
