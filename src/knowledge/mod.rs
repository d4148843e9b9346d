pub mod engine;
pub mod error;
pub mod index;
pub mod stats;
pub mod store;
pub mod table;
pub mod types;
pub mod validate;

pub use engine::{EngineOptions, KnowledgeEngine};
pub use error::KnowledgeError;
pub use stats::KnowledgeStats;
pub use store::{StoreError, TopicStore};
pub use types::{ScoredTopic, Topic};
