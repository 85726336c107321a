//! Location suggestion merging shared by both backends.

use std::collections::HashSet;

use propsearch_core::error::{Error, Result};

/// A distinct place name and how many listings carry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceCount {
    pub name: String,
    pub count: u64,
}

impl PlaceCount {
    pub fn new(name: impl Into<String>, count: u64) -> Self {
        Self { name: name.into(), count }
    }
}

/// Trimmed input, or `InvalidQuery` when there is nothing to match on.
pub fn check_partial(partial: &str) -> Result<&str> {
    let trimmed = partial.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidQuery("location suggestion needs some text".into()));
    }
    Ok(trimmed)
}

fn ranked(mut places: Vec<PlaceCount>) -> Vec<PlaceCount> {
    places.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    places
}

/// Names containing `partial` (case-insensitive): cities first, then
/// neighborhoods, each most common first. Case-insensitive duplicates
/// collapse onto the first occurrence.
pub fn merge_suggestions(partial: &str, cities: Vec<PlaceCount>, neighborhoods: Vec<PlaceCount>, limit: usize) -> Vec<String> {
    let needle = partial.trim().to_lowercase();
    let mut seen = HashSet::new();
    ranked(cities)
        .into_iter()
        .chain(ranked(neighborhoods))
        .map(|p| p.name.trim().to_string())
        .filter(|name| !name.is_empty() && name.to_lowercase().contains(&needle))
        .filter(|name| seen.insert(name.to_lowercase()))
        .take(limit)
        .collect()
}
