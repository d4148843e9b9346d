//! Core knowledge type definitions.

use serde::{Deserialize, Serialize};

/// Generate a fresh topic identifier (UUID v7, time-sortable).
pub fn new_topic_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// A named unit of knowledge.
///
/// Only `definition` determines where the topic sits in vector space; `facts`
/// are carried along as descriptive payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// Stable identifier and join key across store, embedding table, and index.
    /// A blank id is replaced with a fresh one when the topic is first added.
    #[serde(default = "new_topic_id")]
    pub id: String,
    /// Unique display label.
    pub name: String,
    /// Free text used as the embedding source.
    pub definition: String,
    /// Ordered supporting statements.
    #[serde(default)]
    pub facts: Vec<String>,
    /// Caller-supplied score, nominally in `[0.0, 1.0]`. Stored as given.
    #[serde(default)]
    pub confidence: f64,
    /// ISO 8601 instant of first persistence. `None` until stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Topic {
    pub fn new(name: impl Into<String>, definition: impl Into<String>, facts: Vec<String>) -> Self {
        Self {
            id: new_topic_id(),
            name: name.into(),
            definition: definition.into(),
            facts,
            confidence: 0.0,
            created_at: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

/// A retrieved topic with its squared Euclidean distance to the query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredTopic {
    #[serde(flatten)]
    pub topic: Topic,
    pub distance: f32,
}
