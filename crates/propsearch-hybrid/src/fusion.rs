//! Score fusion of the lexical and semantic candidate lists.
//!
//! Each source is min-max normalized on its own, then combined linearly.
//! Everything here is pure: the same inputs always produce the same ranks.

use std::cmp::Ordering;
use std::collections::HashMap;

use propsearch_core::config::SearchSettings;
use propsearch_core::error::{Error, Result};
use propsearch_core::types::{CandidateResult, FusedResult, ListingId, SourceKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
	pub lexical: f32,
	pub semantic: f32,
}

impl Default for FusionWeights {
	fn default() -> Self { Self { lexical: 0.5, semantic: 0.5 } }
}

impl FusionWeights {
	pub fn new(lexical: f32, semantic: f32) -> Result<Self> {
		let ok = |w: f32| w.is_finite() && w >= 0.0;
		if !ok(lexical) || !ok(semantic) {
			return Err(Error::InvalidConfig(format!("fusion weights must be finite and >= 0, got {lexical}/{semantic}")));
		}
		if lexical + semantic <= 0.0 {
			return Err(Error::InvalidConfig("fusion weights must not both be zero".into()));
		}
		Ok(Self { lexical, semantic })
	}

	pub fn from_settings(settings: &SearchSettings) -> Result<Self> {
		Self::new(settings.lexical_weight, settings.semantic_weight)
	}
}

/// Best finite raw score per id, in first-seen order.
fn best_scores(candidates: &[CandidateResult]) -> Vec<(&str, f32)> {
	let mut order: Vec<&str> = Vec::new();
	let mut best: HashMap<&str, f32> = HashMap::new();
	for c in candidates.iter().filter(|c| c.score.is_finite()) {
		match best.get_mut(c.id.as_str()) {
			Some(s) => { if c.score > *s { *s = c.score; } }
			None => { order.push(&c.id); best.insert(&c.id, c.score); }
		}
	}
	order.into_iter().filter_map(|id| best.get(id).map(|s| (id, *s))).collect()
}

/// Min-max normalize one source list into `id -> (normalized, raw)`.
///
/// The top score maps to 1.0 and the lowest to 0.0. When every score is
/// equal (including a single candidate) all map to 1.0.
pub fn normalize(candidates: &[CandidateResult]) -> Vec<(ListingId, f32, f32)> {
	let scores = best_scores(candidates);
	// f64 so the span of two extreme f32 scores cannot overflow
	let (min, max) = scores.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, s)| (lo.min(f64::from(*s)), hi.max(f64::from(*s))));
	let span = max - min;
	scores.into_iter()
		.map(|(id, raw)| {
			let norm = if span > 0.0 { (f64::from(raw) - min) / span } else { 1.0 };
			(id.to_string(), norm.clamp(0.0, 1.0) as f32, raw)
		})
		.collect()
}

fn rank_order(a: &FusedResult, b: &FusedResult) -> Ordering {
	b.score.total_cmp(&a.score)
		.then_with(|| b.is_dual_source().cmp(&a.is_dual_source()))
		.then_with(|| {
			let (ra, rb) = (a.raw_lexical_score.unwrap_or(f32::NEG_INFINITY), b.raw_lexical_score.unwrap_or(f32::NEG_INFINITY));
			rb.total_cmp(&ra)
		})
		.then_with(|| a.id.cmp(&b.id))
}

fn entry(by_id: &mut HashMap<ListingId, FusedResult>, id: ListingId) -> &mut FusedResult {
	by_id.entry(id.clone()).or_insert_with(|| FusedResult {
		id,
		score: 0.0,
		lexical_score: None,
		semantic_score: None,
		raw_lexical_score: None,
		sources: Vec::with_capacity(2),
		rank: 0,
	})
}

/// Fuse both lists into one strictly ranked, duplicate-free list.
pub fn fuse(lexical: &[CandidateResult], semantic: &[CandidateResult], weights: FusionWeights) -> Vec<FusedResult> {
	let mut by_id: HashMap<ListingId, FusedResult> = HashMap::new();

	for (id, norm, raw) in normalize(lexical) {
		let r = entry(&mut by_id, id);
		r.lexical_score = Some(norm);
		r.raw_lexical_score = Some(raw);
		r.sources.push(SourceKind::Lexical);
	}
	for (id, norm, _) in normalize(semantic) {
		let r = entry(&mut by_id, id);
		r.semantic_score = Some(norm);
		r.sources.push(SourceKind::Semantic);
	}

	let mut fused: Vec<FusedResult> = by_id.into_values()
		.map(|mut r| {
			r.score = weights.lexical * r.lexical_score.unwrap_or(0.0) + weights.semantic * r.semantic_score.unwrap_or(0.0);
			r
		})
		.collect();
	fused.sort_by(rank_order);
	for (i, r) in fused.iter_mut().enumerate() { r.rank = i + 1; }
	fused
}

/// [`fuse`], then keep the `n` best. Truncation never happens before ranking.
pub fn fuse_top(lexical: &[CandidateResult], semantic: &[CandidateResult], weights: FusionWeights, n: usize) -> Vec<FusedResult> {
	let mut fused = fuse(lexical, semantic, weights);
	fused.truncate(n);
	fused
}

#[cfg(test)]
mod tests {
	use super::*;

	fn lex(items: &[(&str, f32)]) -> Vec<CandidateResult> {
		items.iter().enumerate().map(|(i, (id, s))| CandidateResult::new(*id, SourceKind::Lexical, *s, i + 1)).collect()
	}

	fn sem(items: &[(&str, f32)]) -> Vec<CandidateResult> {
		items.iter().enumerate().map(|(i, (id, s))| CandidateResult::new(*id, SourceKind::Semantic, *s, i + 1)).collect()
	}

	fn ids(fused: &[FusedResult]) -> Vec<&str> { fused.iter().map(|r| r.id.as_str()).collect() }

	#[test]
	fn dual_source_wins_the_tie() {
		let fused = fuse(&lex(&[("A", 0.9), ("B", 0.5)]), &sem(&[("B", 0.8), ("C", 0.3)]), FusionWeights::default());
		assert_eq!(ids(&fused), vec!["B", "A", "C"]);
		let score = |id: &str| fused.iter().find(|r| r.id == id).map(|r| r.score).unwrap();
		assert!((score("A") - 0.5).abs() < 1e-6);
		assert!((score("B") - 0.5).abs() < 1e-6);
		assert!(score("C").abs() < 1e-6);
		assert_eq!(fused[0].sources, vec![SourceKind::Lexical, SourceKind::Semantic]);
		assert_eq!(fused.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
	}

	#[test]
	fn normalization_bounds() {
		let n = normalize(&lex(&[("a", 12.0), ("b", 7.0), ("c", 2.0)]));
		assert_eq!(n[0], ("a".to_string(), 1.0, 12.0));
		assert_eq!(n[1].1, 0.5);
		assert_eq!(n[2].1, 0.0);
	}

	#[test]
	fn single_and_equal_scores_normalize_to_one() {
		assert_eq!(normalize(&lex(&[("a", 3.3)]))[0].1, 1.0);
		assert!(normalize(&lex(&[("a", 2.0), ("b", 2.0)])).iter().all(|(_, n, _)| *n == 1.0));
		assert!(normalize(&[]).is_empty());
	}

	#[test]
	fn non_finite_scores_are_discarded() {
		let n = normalize(&lex(&[("a", f32::NAN), ("b", 4.0), ("c", f32::INFINITY), ("d", 1.0)]));
		assert_eq!(n.iter().map(|(id, _, _)| id.as_str()).collect::<Vec<_>>(), vec!["b", "d"]);
	}

	#[test]
	fn extreme_scores_stay_bounded() {
		let n = normalize(&lex(&[("a", 3e38), ("b", -3e38)]));
		assert_eq!(n[0], ("a".to_string(), 1.0, 3e38));
		assert_eq!(n[1].1, 0.0);
		let fused = fuse(&lex(&[("a", f32::MAX), ("b", f32::MIN)]), &[], FusionWeights::default());
		assert_eq!(ids(&fused), vec!["a", "b"]);
		assert!(fused.iter().all(|r| r.score.is_finite()));
	}

	#[test]
	fn repeated_id_keeps_best_score() {
		let n = normalize(&lex(&[("a", 1.0), ("b", 5.0), ("a", 9.0)]));
		assert_eq!(n.len(), 2);
		assert_eq!(n[0], ("a".to_string(), 1.0, 9.0));
	}

	#[test]
	fn ties_fall_back_to_raw_lexical_then_id() {
		// both lexical-only with equal normalized scores
		let fused = fuse(&lex(&[("z", 4.0), ("y", 4.0)]), &[], FusionWeights::default());
		assert_eq!(ids(&fused), vec!["y", "z"]);

		// equal fused score, different raw lexical
		let w = FusionWeights::new(1.0, 1.0).unwrap();
		let fused = fuse(&lex(&[("p", 8.0), ("q", 2.0)]), &sem(&[("q", 0.9), ("p", 0.1)]), w);
		assert_eq!(ids(&fused), vec!["p", "q"]);
	}

	#[test]
	fn one_empty_source() {
		let fused = fuse(&[], &sem(&[("a", 0.9), ("b", 0.1)]), FusionWeights::default());
		assert_eq!(ids(&fused), vec!["a", "b"]);
		assert!(fused.iter().all(|r| r.lexical_score.is_none() && r.sources == vec![SourceKind::Semantic]));
		assert!(fuse(&[], &[], FusionWeights::default()).is_empty());
	}

	#[test]
	fn deterministic_and_bounded() {
		let l = lex(&[("a", 3.0), ("b", 2.0), ("c", 1.0), ("d", 0.5)]);
		let s = sem(&[("d", 0.99), ("c", 0.7), ("e", 0.2)]);
		let first = fuse(&l, &s, FusionWeights::default());
		for _ in 0..5 { assert_eq!(fuse(&l, &s, FusionWeights::default()), first); }
		assert!(first.iter().all(|r| (0.0..=1.0).contains(&r.score)));
		let mut seen: Vec<&str> = ids(&first);
		seen.sort_unstable();
		seen.dedup();
		assert_eq!(seen.len(), first.len());
	}

	#[test]
	fn fuse_top_truncates_after_ranking() {
		let l = lex(&[("a", 1.0), ("b", 0.9), ("c", 0.1)]);
		let s = sem(&[("b", 1.0)]);
		let top = fuse_top(&l, &s, FusionWeights::default(), 1);
		assert_eq!(ids(&top), vec!["b"]);
	}

	#[test]
	fn weights_are_validated() {
		assert!(FusionWeights::new(0.0, 0.0).is_err());
		assert!(FusionWeights::new(-0.1, 1.0).is_err());
		assert!(FusionWeights::new(f32::NAN, 1.0).is_err());
		assert!(FusionWeights::new(0.0, 1.0).is_ok());
	}
}
