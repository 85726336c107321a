//! propsearch-embed
//!
//! Embedding Client: text normalization, a shared TTL/capacity-bounded
//! embedding cache, batching and retry around an [`EmbedProvider`].
//!
//! Respects `APP_USE_FAKE_EMBEDDINGS=1` to switch to the deterministic
//! [`FakeProvider`] for tests and offline development.
//!
//! [`EmbedProvider`]: propsearch_core::traits::EmbedProvider

pub mod cache;
pub mod client;
pub mod normalize;
pub mod provider;

pub use cache::EmbeddingCache;
pub use client::{EmbedOptions, EmbeddingClient};
pub use normalize::normalize;
pub use provider::{get_default_provider, FakeProvider, OpenAiProvider};
