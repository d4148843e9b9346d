//! The knowledge engine: one owner for the store, the embedder, the
//! in-memory embedding table and the similarity index.
//!
//! A topic's `definition` is encoded once per add or update. The vector goes
//! into the [`EmbeddingTable`] under the topic id, and the table's slot order
//! is the [`SimilarityIndex`] row order, so a search hit maps back to an id
//! through the table. Adds append one row; updates rebuild the whole index so
//! no stale vector is ever reachable.
//!
//! Mutations serialize on an internal writer lock. The table and index share
//! one `RwLock`, so queries run concurrently with each other and never see a
//! half-rebuilt index.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{LorekeepConfig, RetrievalConfig};
use crate::embedding::{self, EmbeddingProvider};

use super::error::KnowledgeError;
use super::index::{IndexError, SimilarityIndex};
use super::stats::KnowledgeStats;
use super::store::TopicStore;
use super::table::{EmbeddingTable, Placement};
use super::types::{new_topic_id, ScoredTopic, Topic};
use super::validate::{validate_embedding_input, validate_topic};

/// Definitions encoded per provider call when reconstructing from the store.
const ENCODE_CHUNK: usize = 64;

/// Retrieval behaviour, usually taken from the `[retrieval]` config section.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// When false, topics are stored and embedded but every query returns nothing.
    pub enable_index: bool,
    pub default_top_k: usize,
    /// Reported in stats; not applied to results.
    pub confidence_threshold: f64,
    /// Rebuild the whole index on every add instead of appending one row.
    pub rebuild_on_insert: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for EngineOptions {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            enable_index: config.enable_index,
            default_top_k: config.default_top_k,
            confidence_threshold: config.confidence_threshold,
            rebuild_on_insert: config.rebuild_on_insert,
        }
    }
}

#[derive(Default)]
struct IndexState {
    table: EmbeddingTable,
    index: Option<SimilarityIndex>,
    /// Fixed by the first vector seen.
    dimension: Option<usize>,
    degraded: bool,
}

impl IndexState {
    fn indexed(&self) -> usize {
        self.index.as_ref().map_or(0, SimilarityIndex::len)
    }
}

pub struct KnowledgeEngine {
    store: TopicStore,
    embedder: Arc<dyn EmbeddingProvider>,
    options: EngineOptions,
    state: RwLock<IndexState>,
    writer: Mutex<()>,
}

impl fmt::Debug for KnowledgeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnowledgeEngine")
            .field("store", &self.store)
            .field("model", &self.embedder.model_id())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl KnowledgeEngine {
    /// Initialize the store and rebuild the embedding table and index from
    /// every stored topic.
    pub fn open(
        store: TopicStore,
        embedder: Arc<dyn EmbeddingProvider>,
        options: EngineOptions,
    ) -> Result<Self, KnowledgeError> {
        store.initialize()?;

        match store.embedding_model() {
            Ok(Some(previous)) if previous != embedder.model_id() => tracing::warn!(
                previous = %previous,
                current = %embedder.model_id(),
                "embedding model changed; vectors are regenerated from stored definitions"
            ),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "could not read stored embedding model"),
        }

        let engine = Self {
            store,
            embedder,
            options,
            state: RwLock::new(IndexState::default()),
            writer: Mutex::new(()),
        };
        let loaded = engine.load_from_store()?;
        tracing::info!(
            topics = loaded,
            model = %engine.embedder.model_id(),
            index = engine.options.enable_index,
            "knowledge engine ready"
        );
        Ok(engine)
    }

    /// Build the provider, store and options from a loaded config.
    pub fn from_config(config: &LorekeepConfig) -> anyhow::Result<Self> {
        let provider = embedding::create_provider(&config.embedding)?;
        let store = TopicStore::new(config.resolved_db_path());
        Ok(Self::open(
            store,
            Arc::from(provider),
            EngineOptions::from(&config.retrieval),
        )?)
    }

    pub fn store(&self) -> &TopicStore {
        &self.store
    }

    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn default_top_k(&self) -> usize {
        self.options.default_top_k
    }

    pub fn is_degraded(&self) -> bool {
        self.read_state().degraded
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Validate, encode, persist, then make the topic searchable.
    ///
    /// A blank id is replaced with a fresh one. Returns the stored topic.
    /// Nothing is persisted unless validation, encoding and the dimension
    /// check all pass. An [`KnowledgeError::IndexInconsistency`] means the
    /// record is durable but the index could not take it.
    pub fn add_topic(&self, mut topic: Topic) -> Result<Topic, KnowledgeError> {
        let _writer = self.lock_writer();

        // 1. Validate
        validate_topic(&topic)?;
        if topic.id.trim().is_empty() {
            topic.id = new_topic_id();
        }

        // 2. Encode
        let vector = self.embedder.encode(&topic.definition)?;
        self.check_dimension(vector.len())?;

        // 3. Persist
        let stored = self.store.insert(&topic)?;

        // 4–5. Embedding table, then index
        self.index_new(&stored.id, vector)?;

        tracing::info!(id = %stored.id, name = %stored.name, "topic added");
        Ok(stored)
    }

    /// Add each topic in turn. One failure does not stop the rest.
    pub fn add_topics(&self, topics: Vec<Topic>) -> Vec<Result<Topic, KnowledgeError>> {
        topics.into_iter().map(|t| self.add_topic(t)).collect()
    }

    /// Re-encode and replace an existing topic, then rebuild the index.
    ///
    /// `created_at` is kept from the stored row.
    pub fn update_topic(&self, topic: Topic) -> Result<Topic, KnowledgeError> {
        let _writer = self.lock_writer();
        self.update_locked(topic)
    }

    /// Read the stored topic, apply `change`, and write the result back, all
    /// under the writer lock. The id cannot be changed.
    pub fn update_topic_with<F>(&self, id: &str, change: F) -> Result<Topic, KnowledgeError>
    where
        F: FnOnce(Topic) -> Topic,
    {
        let _writer = self.lock_writer();
        let current = self
            .store
            .get(id)?
            .ok_or_else(|| KnowledgeError::NotFound(id.to_string()))?;
        let mut changed = change(current);
        changed.id = id.to_string();
        self.update_locked(changed)
    }

    fn update_locked(&self, topic: Topic) -> Result<Topic, KnowledgeError> {
        validate_update(&topic)?;
        let vector = self.embedder.encode(&topic.definition)?;
        self.check_dimension(vector.len())?;

        let stored = self.store.update(&topic)?;
        self.reindex(vec![(stored.id.clone(), vector)])?;

        tracing::info!(id = %stored.id, name = %stored.name, "topic updated");
        Ok(stored)
    }

    /// Update several topics with a single index rebuild.
    ///
    /// Everything is validated and encoded before the first write. If a store
    /// update fails partway, the topics already written are still reindexed
    /// before the error is returned.
    pub fn update_topics(&self, topics: Vec<Topic>) -> Result<Vec<Topic>, KnowledgeError> {
        if topics.is_empty() {
            return Ok(vec![]);
        }
        let _writer = self.lock_writer();

        for topic in &topics {
            validate_update(topic)?;
        }
        let texts: Vec<&str> = topics.iter().map(|t| t.definition.as_str()).collect();
        let vectors = self.embedder.encode_batch(&texts)?;
        for v in &vectors {
            self.check_dimension(v.len())?;
        }

        let mut updated = Vec::with_capacity(topics.len());
        let mut replaced = Vec::with_capacity(topics.len());
        let mut failure = None;
        for (topic, vector) in topics.iter().zip(vectors) {
            match self.store.update(topic) {
                Ok(stored) => {
                    replaced.push((stored.id.clone(), vector));
                    updated.push(stored);
                }
                Err(e) => {
                    failure = Some(KnowledgeError::from(e));
                    break;
                }
            }
        }

        if !replaced.is_empty() {
            self.reindex(replaced)?;
        }
        if let Some(e) = failure {
            return Err(e);
        }

        tracing::info!(count = updated.len(), "topics updated");
        Ok(updated)
    }

    /// Re-encode every stored topic and replace the table and index.
    ///
    /// Clears the degraded flag. Returns the number of topics loaded.
    pub fn reload(&self) -> Result<usize, KnowledgeError> {
        let _writer = self.lock_writer();
        let count = self.load_from_store()?;
        tracing::info!(topics = count, "embedding table and index reconstructed from store");
        Ok(count)
    }

    /// Rebuild the index from the current embedding table.
    pub fn rebuild_index(&self) -> Result<usize, KnowledgeError> {
        let _writer = self.lock_writer();
        let mut state = self.write_state();
        match self.rebuild_locked(&mut state) {
            Ok(()) => {
                tracing::info!(vectors = state.indexed(), "index rebuilt");
                Ok(state.indexed())
            }
            Err(e) => {
                state.degraded = true;
                tracing::error!(error = %e, "index rebuild failed");
                Err(KnowledgeError::IndexInconsistency(e.to_string()))
            }
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Nearest topics to `query`, closest first, never failing.
    ///
    /// Any error is logged and turned into an empty result.
    pub fn get_relevant_knowledge(&self, query: &str, top_k: usize) -> Vec<Topic> {
        match self.try_get_relevant_knowledge(query, top_k) {
            Ok(hits) => hits.into_iter().map(|hit| hit.topic).collect(),
            Err(e) => {
                tracing::error!(error = %e, "knowledge retrieval failed; returning no results");
                vec![]
            }
        }
    }

    /// Nearest topics to `query` with their squared distances, closest first.
    ///
    /// An empty or disabled index yields `Ok` with no hits.
    pub fn try_get_relevant_knowledge(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredTopic>, KnowledgeError> {
        validate_embedding_input(query)?;
        if !self.options.enable_index || self.read_state().indexed() == 0 {
            return Ok(vec![]);
        }

        let vector = self.embedder.encode(query)?;
        self.search_by_vector(&vector, top_k)
    }

    /// Nearest topics to an already-encoded query vector.
    pub fn search_by_vector(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredTopic>, KnowledgeError> {
        let (ranked, unmapped) = {
            let state = self.read_state();
            if let Some(expected) = state.dimension {
                if vector.len() != expected {
                    return Err(KnowledgeError::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
            }
            let Some(index) = state.index.as_ref() else {
                return Ok(vec![]);
            };

            let mut ranked = Vec::new();
            let mut unmapped = None;
            for hit in index.search(vector, top_k)? {
                match state.table.id_for_slot(hit.slot) {
                    Some(id) => ranked.push((id.to_string(), hit.distance)),
                    None => {
                        unmapped = Some(hit.slot);
                        break;
                    }
                }
            }
            (ranked, unmapped)
        };

        if let Some(slot) = unmapped {
            let reason = format!("index slot {slot} has no topic in the embedding table");
            self.recover_index(&reason);
            return Err(KnowledgeError::IndexInconsistency(reason));
        }

        let ids: Vec<String> = ranked.iter().map(|(id, _)| id.clone()).collect();
        let mut by_id: HashMap<String, Topic> = self
            .store
            .get_by_ids(&ids)?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();

        Ok(ranked
            .into_iter()
            .filter_map(|(id, distance)| match by_id.remove(&id) {
                Some(topic) => Some(ScoredTopic { topic, distance }),
                None => {
                    tracing::warn!(id = %id, "indexed topic missing from store");
                    None
                }
            })
            .collect())
    }

    pub fn get_topic(&self, id: &str) -> Result<Option<Topic>, KnowledgeError> {
        Ok(self.store.get(id)?)
    }

    /// Cosine similarity of two texts under the engine's embedder.
    pub fn similarity(&self, a: &str, b: &str) -> Result<f32, KnowledgeError> {
        validate_embedding_input(a)?;
        validate_embedding_input(b)?;
        Ok(self.embedder.similarity(a, b)?)
    }

    /// Counts and memory usage. Never fails; unavailable figures are zero.
    pub fn get_stats(&self) -> KnowledgeStats {
        let total_topics = self.store.count().unwrap_or_else(|e| {
            tracing::error!(error = %e, "topic count unavailable");
            0
        });
        let last_updated = self.store.last_update_time().unwrap_or_else(|e| {
            tracing::error!(error = %e, "last update time unavailable");
            None
        });
        let db_size_bytes = std::fs::metadata(self.store.path())
            .map(|m| m.len())
            .unwrap_or(0);

        let state = self.read_state();
        KnowledgeStats {
            total_topics,
            indexed_vectors: state.indexed(),
            embedding_model: self.embedder.model_id().to_string(),
            embedding_dimension: state.dimension,
            memory_usage: state.table.usage_stats().into(),
            db_size_bytes,
            last_updated,
            index_enabled: self.options.enable_index,
            confidence_threshold: self.options.confidence_threshold,
            degraded: state.degraded,
        }
    }

    // ── Internals ───────────────────────────────────────────────────

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_dimension(&self, actual: usize) -> Result<(), KnowledgeError> {
        match self.read_state().dimension {
            Some(expected) if expected != actual => {
                Err(KnowledgeError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    /// Encode every stored topic, then swap in the new table and index in one step.
    /// Caller holds the writer lock (or owns the engine exclusively).
    fn load_from_store(&self) -> Result<usize, KnowledgeError> {
        let topics = self.store.all()?;
        let mut dimension = self.read_state().dimension;
        let mut table = EmbeddingTable::new();

        for chunk in topics.chunks(ENCODE_CHUNK) {
            let texts: Vec<&str> = chunk.iter().map(|t| t.definition.as_str()).collect();
            let vectors = self.embedder.encode_batch(&texts)?;
            for (topic, vector) in chunk.iter().zip(vectors) {
                let expected = *dimension.get_or_insert(vector.len());
                if vector.len() != expected {
                    return Err(KnowledgeError::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
                table.put(&topic.id, vector);
            }
        }

        let index = match dimension {
            Some(dim) if self.options.enable_index => {
                Some(SimilarityIndex::build(dim, table.vectors())?)
            }
            _ => None,
        };
        let count = table.len();

        *self.write_state() = IndexState {
            table,
            index,
            dimension,
            degraded: false,
        };

        if let Some(dim) = dimension.filter(|_| count > 0) {
            self.record_model(dim);
        }
        Ok(count)
    }

    /// Put a freshly stored topic's vector into the table and index.
    fn index_new(&self, id: &str, vector: Vec<f32>) -> Result<(), KnowledgeError> {
        let mut state = self.write_state();
        let first = state.dimension.is_none();
        let dimension = *state.dimension.get_or_insert(vector.len());
        let placement = state.table.put(id, vector);

        let outcome = if !self.options.enable_index {
            Ok(())
        } else if self.options.rebuild_on_insert || matches!(placement, Placement::Replaced(_)) {
            self.rebuild_locked(&mut state).map_err(|e| e.to_string())
        } else {
            append_to_index(&mut state, id, placement.slot(), dimension)
        };

        if let Err(reason) = outcome {
            state.degraded = true;
            tracing::warn!(id = %id, reason = %reason, "index out of step with store; rebuilding");
            match self.rebuild_locked(&mut state) {
                Ok(()) => tracing::info!(vectors = state.indexed(), "index rebuilt after inconsistency"),
                Err(e) => tracing::error!(error = %e, "index rebuild failed; topic is stored but not searchable"),
            }
            return Err(KnowledgeError::IndexInconsistency(reason));
        }
        drop(state);

        if first {
            self.record_model(dimension);
        }
        Ok(())
    }

    /// Replace table entries and rebuild the index once.
    fn reindex(&self, replaced: Vec<(String, Vec<f32>)>) -> Result<(), KnowledgeError> {
        let mut state = self.write_state();
        for (id, vector) in replaced {
            if state.dimension.is_none() {
                state.dimension = Some(vector.len());
            }
            state.table.put(&id, vector);
        }

        if let Err(e) = self.rebuild_locked(&mut state) {
            state.degraded = true;
            tracing::error!(error = %e, "index rebuild after update failed; results may be stale");
            return Err(KnowledgeError::IndexInconsistency(e.to_string()));
        }
        tracing::debug!(vectors = state.indexed(), "index rebuilt");
        Ok(())
    }

    fn rebuild_locked(&self, state: &mut IndexState) -> Result<(), IndexError> {
        state.index = match state.dimension {
            Some(dim) if self.options.enable_index => {
                Some(SimilarityIndex::build(dim, state.table.vectors())?)
            }
            _ => None,
        };
        state.degraded = false;
        Ok(())
    }

    fn recover_index(&self, reason: &str) {
        tracing::warn!(reason = %reason, "index inconsistency detected; rebuilding");
        if let Err(e) = self.rebuild_index() {
            tracing::error!(error = %e, "recovery rebuild failed");
        }
    }

    fn record_model(&self, dimension: usize) {
        if let Err(e) = self.store.record_embedding_model(self.embedder.model_id(), dimension) {
            tracing::warn!(error = %e, "could not record embedding model");
        }
    }
}

fn validate_update(topic: &Topic) -> Result<(), KnowledgeError> {
    if topic.id.trim().is_empty() {
        return Err(KnowledgeError::Validation("topic id is required for update".into()));
    }
    validate_topic(topic)
}

fn append_to_index(
    state: &mut IndexState,
    id: &str,
    slot: usize,
    dimension: usize,
) -> Result<(), String> {
    let IndexState { table, index, .. } = state;
    let index = index.get_or_insert_with(|| SimilarityIndex::new(dimension));
    let vector = table
        .get(id)
        .ok_or_else(|| format!("topic {id} missing from embedding table"))?;
    let appended = index.append(vector).map_err(|e| e.to_string())?;
    if appended != slot {
        return Err(format!(
            "index slot {appended} does not match table slot {slot} for topic {id}"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::hashed::HashEmbeddingProvider;
    use crate::embedding::EmbeddingError;
    use tempfile::TempDir;

    /// Returns a preset vector per text, so distances are exact.
    struct FixedProvider {
        vectors: HashMap<String, Vec<f32>>,
    }

    impl FixedProvider {
        fn new(pairs: &[(&str, Vec<f32>)]) -> Self {
            Self {
                vectors: pairs.iter().map(|(t, v)| (t.to_string(), v.clone())).collect(),
            }
        }
    }

    impl EmbeddingProvider for FixedProvider {
        fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            crate::embedding::ensure_text(text)?;
            self.vectors
                .get(text)
                .cloned()
                .ok_or_else(|| EmbeddingError::Model(format!("no fixture for {text:?}")))
        }

        fn dimensions(&self) -> usize {
            self.vectors.values().next().map_or(0, Vec::len)
        }

        fn model_id(&self) -> &str {
            "fixed"
        }
    }

    fn open_with(
        tmp: &TempDir,
        provider: Arc<dyn EmbeddingProvider>,
        options: EngineOptions,
    ) -> KnowledgeEngine {
        KnowledgeEngine::open(TopicStore::new(tmp.path().join("knowledge.db")), provider, options)
            .unwrap()
    }

    fn hash_engine(tmp: &TempDir) -> KnowledgeEngine {
        open_with(tmp, Arc::new(HashEmbeddingProvider::new(1024)), EngineOptions::default())
    }

    fn fixed_engine(tmp: &TempDir, pairs: &[(&str, Vec<f32>)]) -> KnowledgeEngine {
        open_with(tmp, Arc::new(FixedProvider::new(pairs)), EngineOptions::default())
    }

    #[test]
    fn added_topic_retrieves_itself() {
        let tmp = TempDir::new().unwrap();
        let engine = hash_engine(&tmp);
        let defs = [
            ("greetings", "Basic greeting responses"),
            ("weather", "Forecasts rain sunshine and temperature"),
            ("cooking", "Recipes for pasta and bread"),
        ];
        for (name, def) in defs {
            engine.add_topic(Topic::new(name, def, vec![])).unwrap();
        }

        for (name, def) in defs {
            let hits = engine.try_get_relevant_knowledge(def, 1).unwrap();
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].topic.name, name);
            assert!(hits[0].distance.abs() < 1e-5);
        }
    }

    #[test]
    fn greeting_query_finds_greetings_topic() {
        let tmp = TempDir::new().unwrap();
        let engine = hash_engine(&tmp);
        engine
            .add_topic(Topic::new(
                "greetings",
                "Basic greeting responses",
                vec!["Always be polite".into()],
            ))
            .unwrap();
        engine
            .add_topic(Topic::new("investing", "Diversification reduces portfolio risk", vec![]))
            .unwrap();

        let results = engine.get_relevant_knowledge("How should I greet someone?", 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "greetings");
        assert_eq!(results[0].facts, vec!["Always be polite".to_string()]);
    }

    #[test]
    fn results_are_rank_ordered_and_capped() {
        let tmp = TempDir::new().unwrap();
        let engine = fixed_engine(
            &tmp,
            &[
                ("far", vec![3.0, 0.0]),
                ("near", vec![1.0, 0.0]),
                ("mid", vec![2.0, 0.0]),
                ("origin", vec![0.0, 0.0]),
            ],
        );
        for def in ["far", "near", "mid"] {
            engine.add_topic(Topic::new(def, def, vec![])).unwrap();
        }

        let hits = engine.try_get_relevant_knowledge("origin", 2).unwrap();
        let names: Vec<&str> = hits.iter().map(|h| h.topic.name.as_str()).collect();
        assert_eq!(names, vec!["near", "mid"]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));

        assert_eq!(engine.try_get_relevant_knowledge("origin", 10).unwrap().len(), 3);
        assert!(engine.try_get_relevant_knowledge("origin", 0).unwrap().is_empty());
    }

    #[test]
    fn empty_engine_returns_nothing() {
        let tmp = TempDir::new().unwrap();
        let engine = hash_engine(&tmp);
        assert!(engine.get_relevant_knowledge("anything", 5).is_empty());
        assert!(engine.try_get_relevant_knowledge("anything", 5).unwrap().is_empty());

        let stats = engine.get_stats();
        assert_eq!(stats.total_topics, 0);
        assert_eq!(stats.indexed_vectors, 0);
        assert_eq!(stats.memory_usage.count, 0);
        assert!(stats.last_updated.is_none());
    }

    #[test]
    fn blank_query_is_a_validation_error_but_never_fails_the_lenient_call() {
        let tmp = TempDir::new().unwrap();
        let engine = hash_engine(&tmp);
        engine.add_topic(Topic::new("a", "alpha", vec![])).unwrap();

        assert!(matches!(
            engine.try_get_relevant_knowledge("   ", 3),
            Err(KnowledgeError::Validation(_))
        ));
        assert!(engine.get_relevant_knowledge("   ", 3).is_empty());
    }

    #[test]
    fn duplicate_name_leaves_first_topic_intact() {
        let tmp = TempDir::new().unwrap();
        let engine = hash_engine(&tmp);
        let first = engine
            .add_topic(Topic::new("greetings", "Basic greeting responses", vec![]))
            .unwrap();

        let err = engine
            .add_topic(Topic::new("greetings", "Something else entirely", vec![]))
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::DuplicateName(ref n) if n == "greetings"));

        let stats = engine.get_stats();
        assert_eq!(stats.total_topics, 1);
        assert_eq!(stats.indexed_vectors, 1);
        let hits = engine.get_relevant_knowledge("Basic greeting responses", 1);
        assert_eq!(hits[0].id, first.id);
        assert_eq!(hits[0].definition, "Basic greeting responses");
    }

    #[test]
    fn invalid_topic_is_rejected_before_any_write() {
        let tmp = TempDir::new().unwrap();
        let engine = hash_engine(&tmp);
        assert!(matches!(
            engine.add_topic(Topic::new("", "has a definition", vec![])),
            Err(KnowledgeError::Validation(_))
        ));
        assert!(matches!(
            engine.add_topic(Topic::new("named", "  ", vec![])),
            Err(KnowledgeError::Validation(_))
        ));
        assert_eq!(engine.get_stats().total_topics, 0);
    }

    #[test]
    fn encoding_failure_persists_nothing() {
        let tmp = TempDir::new().unwrap();
        let engine = fixed_engine(&tmp, &[("known", vec![1.0, 0.0])]);
        let err = engine
            .add_topic(Topic::new("mystery", "unknown text", vec![]))
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::Encoding(_)));
        assert_eq!(engine.store().count().unwrap(), 0);
    }

    #[test]
    fn blank_id_gets_generated() {
        let tmp = TempDir::new().unwrap();
        let engine = hash_engine(&tmp);
        let stored = engine
            .add_topic(Topic::new("a", "alpha", vec![]).with_id(""))
            .unwrap();
        assert!(!stored.id.is_empty());
        assert!(engine.get_topic(&stored.id).unwrap().is_some());
    }

    #[test]
    fn update_replaces_the_indexed_vector() {
        let tmp = TempDir::new().unwrap();
        let engine = fixed_engine(
            &tmp,
            &[("old", vec![1.0, 0.0]), ("new", vec![0.0, 1.0]), ("other", vec![0.7, 0.7])],
        );
        let stored = engine.add_topic(Topic::new("topic", "old", vec![])).unwrap();
        engine.add_topic(Topic::new("other", "other", vec![])).unwrap();

        let changed = Topic {
            definition: "new".into(),
            ..stored.clone()
        };
        let updated = engine.update_topic(changed).unwrap();
        assert_eq!(updated.created_at, stored.created_at);

        let hits = engine.search_by_vector(&[0.0, 1.0], 1).unwrap();
        assert_eq!(hits[0].topic.id, stored.id);
        assert!(hits[0].distance.abs() < 1e-6);

        // the old vector is gone: nothing sits at distance zero from it
        let hits = engine.search_by_vector(&[1.0, 0.0], 2).unwrap();
        assert!(hits.iter().all(|h| h.distance > 1e-3));

        let stats = engine.get_stats();
        assert_eq!(stats.indexed_vectors, 2);
        assert_eq!(stats.memory_usage.count, 2);
    }

    #[test]
    fn update_errors() {
        let tmp = TempDir::new().unwrap();
        let engine = hash_engine(&tmp);
        engine.add_topic(Topic::new("a", "alpha", vec![])).unwrap();
        let b = engine.add_topic(Topic::new("b", "beta", vec![])).unwrap();

        assert!(matches!(
            engine.update_topic(Topic::new("ghost", "nobody", vec![])),
            Err(KnowledgeError::NotFound(_))
        ));
        assert!(matches!(
            engine.update_topic(Topic::new("x", "y", vec![]).with_id(" ")),
            Err(KnowledgeError::Validation(_))
        ));
        assert!(matches!(
            engine.update_topic(Topic {
                name: "a".into(),
                ..b
            }),
            Err(KnowledgeError::DuplicateName(_))
        ));
        assert!(!engine.is_degraded());
    }

    #[test]
    fn batch_update_rebuilds_once_and_reports_partial_failure() {
        let tmp = TempDir::new().unwrap();
        let engine = fixed_engine(
            &tmp,
            &[
                ("a0", vec![1.0, 0.0]),
                ("b0", vec![0.0, 1.0]),
                ("a1", vec![-1.0, 0.0]),
                ("b1", vec![0.0, -1.0]),
            ],
        );
        let a = engine.add_topic(Topic::new("a", "a0", vec![])).unwrap();
        let b = engine.add_topic(Topic::new("b", "b0", vec![])).unwrap();

        let updated = engine
            .update_topics(vec![
                Topic { definition: "a1".into(), ..a.clone() },
                Topic { definition: "b1".into(), ..b.clone() },
            ])
            .unwrap();
        assert_eq!(updated.len(), 2);
        assert_eq!(engine.search_by_vector(&[-1.0, 0.0], 1).unwrap()[0].topic.id, a.id);

        let err = engine
            .update_topics(vec![
                Topic { definition: "a0".into(), ..a.clone() },
                Topic::new("ghost", "b0", vec![]),
            ])
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::NotFound(_)));
        // the first write landed and is searchable
        let hit = &engine.search_by_vector(&[1.0, 0.0], 1).unwrap()[0];
        assert_eq!(hit.topic.id, a.id);
        assert!(hit.distance.abs() < 1e-6);
    }

    #[test]
    fn dimension_is_fixed_by_first_vector() {
        let tmp = TempDir::new().unwrap();
        let engine = fixed_engine(&tmp, &[("two", vec![1.0, 0.0]), ("three", vec![1.0, 0.0, 0.0])]);
        engine.add_topic(Topic::new("a", "two", vec![])).unwrap();

        let err = engine.add_topic(Topic::new("b", "three", vec![])).unwrap_err();
        assert!(matches!(
            err,
            KnowledgeError::DimensionMismatch { expected: 2, actual: 3 }
        ));
        assert_eq!(engine.store().count().unwrap(), 1);

        assert!(matches!(
            engine.search_by_vector(&[1.0, 0.0, 0.0], 1),
            Err(KnowledgeError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert!(!engine.is_degraded());
    }

    #[test]
    fn reopen_reconstructs_from_store() {
        let tmp = TempDir::new().unwrap();
        let id = {
            let engine = hash_engine(&tmp);
            engine
                .add_topic(Topic::new("greetings", "Basic greeting responses", vec![]))
                .unwrap()
                .id
        };

        let engine = hash_engine(&tmp);
        let stats = engine.get_stats();
        assert_eq!(stats.total_topics, 1);
        assert_eq!(stats.indexed_vectors, 1);
        assert_eq!(stats.embedding_dimension, Some(1024));
        let hits = engine.get_relevant_knowledge("Basic greeting responses", 1);
        assert_eq!(hits[0].id, id);
        assert_eq!(
            engine.store().embedding_model().unwrap().as_deref(),
            Some("hash-fnv1a-1024")
        );
    }

    #[test]
    fn disabled_index_stores_but_never_returns() {
        let tmp = TempDir::new().unwrap();
        let options = EngineOptions {
            enable_index: false,
            ..EngineOptions::default()
        };
        let engine = open_with(&tmp, Arc::new(HashEmbeddingProvider::new(64)), options);
        engine.add_topic(Topic::new("a", "alpha", vec![])).unwrap();

        assert!(engine.get_relevant_knowledge("alpha", 3).is_empty());
        let stats = engine.get_stats();
        assert!(!stats.index_enabled);
        assert_eq!(stats.total_topics, 1);
        assert_eq!(stats.indexed_vectors, 0);
        assert_eq!(stats.memory_usage.count, 1);
    }

    #[test]
    fn rebuild_on_insert_matches_append() {
        let tmp = TempDir::new().unwrap();
        let options = EngineOptions {
            rebuild_on_insert: true,
            ..EngineOptions::default()
        };
        let engine = open_with(&tmp, Arc::new(HashEmbeddingProvider::new(256)), options);
        for (name, def) in [("a", "alpha"), ("b", "beta"), ("c", "gamma")] {
            engine.add_topic(Topic::new(name, def, vec![])).unwrap();
        }
        assert_eq!(engine.get_stats().indexed_vectors, 3);
        assert_eq!(engine.get_relevant_knowledge("beta", 1)[0].name, "b");
    }

    #[test]
    fn reload_and_rebuild_keep_results() {
        let tmp = TempDir::new().unwrap();
        let engine = hash_engine(&tmp);
        engine.add_topic(Topic::new("a", "alpha", vec![])).unwrap();
        engine.add_topic(Topic::new("b", "beta", vec![])).unwrap();

        assert_eq!(engine.reload().unwrap(), 2);
        assert_eq!(engine.rebuild_index().unwrap(), 2);
        assert_eq!(engine.get_relevant_knowledge("alpha", 1)[0].name, "a");
    }

    #[test]
    fn stats_reflect_contents() {
        let tmp = TempDir::new().unwrap();
        let engine = hash_engine(&tmp);
        engine.add_topic(Topic::new("a", "alpha", vec![])).unwrap();
        engine.add_topic(Topic::new("b", "beta", vec![])).unwrap();

        let stats = engine.get_stats();
        assert_eq!(stats.total_topics, 2);
        assert_eq!(stats.indexed_vectors, 2);
        assert_eq!(stats.embedding_model, "hash-fnv1a-1024");
        assert!(stats.memory_usage.approx_memory_bytes >= 2 * 1024 * 4);
        assert!(stats.last_updated.is_some());
        assert!(!stats.degraded);
    }

    #[test]
    fn concurrent_queries_see_consistent_results() {
        let tmp = TempDir::new().unwrap();
        let engine = Arc::new(hash_engine(&tmp));
        for i in 0..10 {
            engine
                .add_topic(Topic::new(format!("t{i}"), format!("topic number {i}"), vec![]))
                .unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|n| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        let hits = engine.get_relevant_knowledge(&format!("topic number {n}"), 3);
                        assert_eq!(hits.len(), 3);
                        assert_eq!(hits[0].name, format!("t{n}"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn similarity_uses_the_embedder() {
        let tmp = TempDir::new().unwrap();
        let engine = hash_engine(&tmp);
        let s = engine.similarity("Always be polite", "Always be polite").unwrap();
        assert!((s - 1.0).abs() < 1e-5);
        assert!(engine.similarity("", "x").is_err());
    }

    #[test]
    fn unmapped_index_slot_is_rebuilt_and_reported() {
        let tmp = TempDir::new().unwrap();
        let engine = fixed_engine(&tmp, &[("alpha", vec![1.0, 0.0])]);
        let a = engine.add_topic(Topic::new("a", "alpha", vec![])).unwrap();

        let stray = [0.0, 1.0];
        engine
            .write_state()
            .index
            .as_mut()
            .unwrap()
            .append(&stray)
            .unwrap();
        assert_eq!(engine.get_stats().indexed_vectors, 2);

        let err = engine.search_by_vector(&stray, 2).unwrap_err();
        assert!(matches!(err, KnowledgeError::IndexInconsistency(_)));

        let stats = engine.get_stats();
        assert_eq!(stats.indexed_vectors, 1);
        assert!(!engine.is_degraded());

        let hits = engine.search_by_vector(&stray, 2).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.topic.id.as_str()).collect();
        assert_eq!(ids, vec![a.id.as_str()]);
    }

    #[test]
    fn add_out_of_step_with_index_is_stored_and_recovered() {
        let tmp = TempDir::new().unwrap();
        let engine = fixed_engine(
            &tmp,
            &[("alpha", vec![1.0, 0.0]), ("beta", vec![0.0, 1.0])],
        );
        engine.add_topic(Topic::new("a", "alpha", vec![])).unwrap();
        engine
            .write_state()
            .index
            .as_mut()
            .unwrap()
            .append(&[5.0, 5.0])
            .unwrap();

        // table slot 1 and index slot 2 disagree
        let err = engine.add_topic(Topic::new("b", "beta", vec![])).unwrap_err();
        assert!(matches!(err, KnowledgeError::IndexInconsistency(_)));

        assert_eq!(engine.store().count().unwrap(), 2);
        assert_eq!(engine.get_stats().indexed_vectors, 2);
        assert!(!engine.is_degraded());
        assert_eq!(engine.get_relevant_knowledge("beta", 1)[0].name, "b");
    }

    #[test]
    fn reload_clears_degraded_state() {
        let tmp = TempDir::new().unwrap();
        let engine = hash_engine(&tmp);
        engine.add_topic(Topic::new("a", "alpha", vec![])).unwrap();

        engine.write_state().degraded = true;
        assert!(engine.is_degraded());
        assert!(engine.get_stats().degraded);

        assert_eq!(engine.reload().unwrap(), 1);
        assert!(!engine.is_degraded());
        assert!(!engine.get_stats().degraded);
    }

    #[test]
    fn concurrent_merge_updates_keep_both_changes() {
        let tmp = TempDir::new().unwrap();
        let engine = Arc::new(hash_engine(&tmp));
        let stored = engine
            .add_topic(Topic::new("greetings", "Basic greeting responses", vec![]))
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let engine = Arc::clone(&engine);
                let id = stored.id.clone();
                std::thread::spawn(move || {
                    engine
                        .update_topic_with(&id, |mut current| {
                            current.facts.push(format!("fact {n}"));
                            current
                        })
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let current = engine.get_topic(&stored.id).unwrap().unwrap();
        assert_eq!(current.facts.len(), 8);
        for n in 0..8 {
            assert!(current.facts.contains(&format!("fact {n}")));
        }
    }

    #[test]
    fn merge_update_of_missing_topic_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let engine = hash_engine(&tmp);
        let err = engine.update_topic_with("missing", |t| t).unwrap_err();
        assert!(matches!(err, KnowledgeError::NotFound(_)));
    }
}
