#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use lorekeep::embedding::hashed::HashEmbeddingProvider;
use lorekeep::embedding::{EmbeddingError, EmbeddingProvider};
use lorekeep::knowledge::{EngineOptions, KnowledgeEngine, Topic, TopicStore};
use tempfile::TempDir;

/// Dimension used by the hash provider in tests. Large enough that bucket
/// collisions don't reorder small scenarios.
pub const TEST_DIM: usize = 1024;

pub fn db_path(tmp: &TempDir) -> PathBuf {
    tmp.path().join("knowledge.db")
}

/// Engine over a fresh on-disk store with the hash provider and default options.
pub fn test_engine(tmp: &TempDir) -> KnowledgeEngine {
    engine_with(tmp, Arc::new(HashEmbeddingProvider::new(TEST_DIM)), EngineOptions::default())
}

pub fn engine_with(
    tmp: &TempDir,
    provider: Arc<dyn EmbeddingProvider>,
    options: EngineOptions,
) -> KnowledgeEngine {
    KnowledgeEngine::open(TopicStore::new(db_path(tmp)), provider, options).unwrap()
}

pub fn topic(name: &str, definition: &str) -> Topic {
    Topic::new(name, definition, vec![])
}

/// Embedder with hand-picked vectors, for exact distance assertions.
/// Unknown text is an encoding error.
pub struct FixedProvider {
    vectors: HashMap<String, Vec<f32>>,
}

impl FixedProvider {
    pub fn new(pairs: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: pairs
                .iter()
                .map(|(text, v)| (text.to_string(), v.clone()))
                .collect(),
        }
    }
}

impl EmbeddingProvider for FixedProvider {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| EmbeddingError::Model(format!("no vector for {text:?}")))
    }

    fn dimensions(&self) -> usize {
        self.vectors.values().next().map_or(0, Vec::len)
    }

    fn model_id(&self) -> &str {
        "fixed-test"
    }
}
