use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use propsearch_core::error::ProviderError;
use propsearch_core::traits::EmbedProvider;
use twox_hash::XxHash64;

/// Deterministic hashed bag-of-words vectors, L2-normalized.
///
/// Texts sharing tokens land close together, which is enough for tests and
/// offline development without a model.
#[derive(Debug, Clone)]
pub struct FakeProvider {
    dim: usize,
    id: String,
}

impl FakeProvider {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("fake:xxh64:d{dim}") }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl EmbedProvider for FakeProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
