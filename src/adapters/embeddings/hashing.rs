//! Deterministic feature-hashing embedding provider.
//!
//! Lower-cased word tokens and character trigrams are hashed into signed buckets and the
//! result is L2-normalized. Needs no network and gives identical vectors for identical text.

use async_trait::async_trait;

use crate::adapters::embeddings::projection;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Projection;
use crate::domain::ports::EmbeddingProvider;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

pub struct HashingEmbeddingProvider {
    dimension: usize,
}

impl HashingEmbeddingProvider {
    pub fn new(dimension: usize) -> DomainResult<Self> {
        if dimension == 0 {
            return Err(DomainError::ValidationFailed("embedding dimension must be > 0".to_string()));
        }
        Ok(Self { dimension })
    }

    /// Synchronous embedding, shared by the async trait method and seeding.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dimension];
        let lowered = text.to_lowercase();

        let mut add = |feature: &[u8], weight: f32| {
            let hash = fnv1a(feature);
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign * weight;
        };

        for word in lowered.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            add(word.as_bytes(), 1.0);
        }

        let chars: Vec<char> = lowered.chars().collect();
        for window in chars.windows(3) {
            let trigram: String = window.iter().collect();
            add(trigram.as_bytes(), 0.5);
        }

        let magnitude = embedding.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt() as f32;
        if magnitude > 1e-10 {
            for val in &mut embedding {
                *val /= magnitude;
            }
        } else {
            // Empty text: a uniform unit vector keeps cosine similarity well-defined.
            let uniform_val = 1.0 / (self.dimension as f32).sqrt();
            embedding.fill(uniform_val);
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    fn name(&self) -> &'static str {
        "hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> DomainResult<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn project(&self, vector: &[f32]) -> Projection {
        projection::project(vector)
    }
}
