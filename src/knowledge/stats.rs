use serde::Serialize;

use super::table::TableUsage;

/// Snapshot returned by `KnowledgeEngine::get_stats`.
///
/// Every field has a zero value, so a failing component yields zeros
/// instead of an error.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KnowledgeStats {
    pub total_topics: u64,
    pub indexed_vectors: usize,
    pub embedding_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_dimension: Option<usize>,
    pub memory_usage: MemoryUsage,
    pub db_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    pub index_enabled: bool,
    /// Reported only. Retrieval does not filter on it.
    pub confidence_threshold: f64,
    /// A stored topic has no searchable vector until the next successful rebuild.
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MemoryUsage {
    pub count: usize,
    pub approx_memory_bytes: usize,
    pub memory_size_mb: f64,
}

impl From<TableUsage> for MemoryUsage {
    fn from(usage: TableUsage) -> Self {
        Self {
            count: usage.count,
            approx_memory_bytes: usage.approx_memory_bytes,
            memory_size_mb: usage.memory_size_mb(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_all_zeros() {
        let stats = KnowledgeStats::default();
        assert_eq!(stats.total_topics, 0);
        assert_eq!(stats.indexed_vectors, 0);
        assert_eq!(stats.memory_usage.count, 0);
        assert!(!stats.degraded);
    }

    #[test]
    fn serializes_without_empty_options() {
        let json = serde_json::to_value(KnowledgeStats::default()).unwrap();
        assert!(json.get("last_updated").is_none());
        assert!(json.get("embedding_dimension").is_none());
        assert_eq!(json["memory_usage"]["count"], 0);
    }

    #[test]
    fn memory_usage_from_table_usage() {
        let usage = MemoryUsage::from(TableUsage {
            count: 2,
            approx_memory_bytes: 2 * 1024 * 1024,
        });
        assert_eq!(usage.count, 2);
        assert!((usage.memory_size_mb - 2.0).abs() < 1e-9);
    }
}
