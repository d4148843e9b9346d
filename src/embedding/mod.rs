//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait and two implementations: a local
//! ONNX all-MiniLM-L6-v2 model ([`local`]) and a dependency-free feature-hashing
//! embedder ([`hashed`]). Both produce L2-normalized vectors, so squared
//! Euclidean distance ranks neighbors the same way cosine similarity does.

pub mod hashed;
pub mod local;

use thiserror::Error;

use crate::config::EmbeddingConfig;

/// Embedding failures. All of them abort the operation that asked for the vector.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding input is empty")]
    EmptyInput,

    #[error("embedding model error: {0}")]
    Model(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("model produced {actual}-dimensional vectors, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Trait for embedding text into vectors.
///
/// Implementations are pure with respect to their model: the same text always
/// yields the same vector. All methods are synchronous; callers in async
/// contexts should use `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.encode(t)).collect()
    }

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;

    /// Identifier of the underlying model, recorded alongside the store.
    fn model_id(&self) -> &str;

    /// Cosine similarity of the two texts' embeddings, in `[-1, 1]`.
    fn similarity(&self, a: &str, b: &str) -> Result<f32, EmbeddingError> {
        let vectors = self.encode_batch(&[a, b])?;
        Ok(cosine_similarity(&vectors[0], &vectors[1]))
    }
}

/// Reject text that is empty after trimming.
pub(crate) fn ensure_text(text: &str) -> Result<(), EmbeddingError> {
    if text.trim().is_empty() {
        return Err(EmbeddingError::EmptyInput);
    }
    Ok(())
}

/// Cosine similarity. Returns 0.0 for zero-norm or mismatched inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// L2-normalize a vector in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Create an embedding provider from config.
///
/// `"local"` needs model files (run `lorekeep model download` first);
/// `"hash"` works offline.
pub fn create_provider(config: &EmbeddingConfig) -> anyhow::Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => {
            let provider = local::LocalEmbeddingProvider::new(config)?;
            Ok(Box::new(provider))
        }
        "hash" => Ok(Box::new(hashed::HashEmbeddingProvider::new(config.dimensions))),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local, hash"),
    }
}
