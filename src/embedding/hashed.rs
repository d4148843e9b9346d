//! Feature-hashing embedding provider.
//!
//! Projects lowercase word unigrams and character trigrams into a fixed number
//! of buckets with a signed FNV-1a hash, then L2-normalizes. Not semantically
//! rich, but deterministic across processes and platforms and needs no model files.

use super::{ensure_text, l2_normalize, EmbeddingError, EmbeddingProvider};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Trigram features count for less than whole words.
const TRIGRAM_WEIGHT: f32 = 0.5;

pub struct HashEmbeddingProvider {
    dimensions: usize,
    model_id: String,
}

impl HashEmbeddingProvider {
    /// `dimensions` is clamped to at least 1.
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            model_id: format!("hash-fnv1a-{dimensions}"),
        }
    }

    fn add_feature(&self, v: &mut [f32], feature: &str, weight: f32) {
        let h = fnv1a(feature.as_bytes());
        let bucket = (h % self.dimensions as u64) as usize;
        // top bit picks the sign
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign * weight;
    }
}

impl EmbeddingProvider for HashEmbeddingProvider {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        ensure_text(text)?;

        let mut v = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            self.add_feature(&mut v, word, 1.0);

            let padded: Vec<char> = format!("#{word}#").chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                self.add_feature(&mut v, &gram, TRIGRAM_WEIGHT);
            }
        }

        // punctuation-only input has no features; keep it distinguishable from nothing
        if v.iter().all(|x| *x == 0.0) {
            self.add_feature(&mut v, lowered.trim(), 1.0);
        }

        l2_normalize(&mut v);
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET, |h, b| (h ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}
