//! propsearch-index
//!
//! Index Client: filtered lexical and k-NN retrieval plus batched
//! get-by-id. `opensearch` talks to an OpenSearch cluster over its query
//! DSL (built in `dsl`); `memory` is an in-process backend over tantivy and
//! brute-force cosine similarity for local use and tests. Both also
//! answer location suggestions (`suggest`).

pub mod document;
pub mod dsl;
pub mod memory;
pub mod opensearch;
pub mod suggest;
pub mod tantivy_utils;

pub use memory::{load_listings, MemoryIndex};
pub use opensearch::{OpenSearchClient, StoreHealth};
pub use suggest::{merge_suggestions, PlaceCount};
