//! MCP `get_relevant_knowledge` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetRelevantKnowledgeParams {
    #[schemars(description = "Natural language text to find relevant topics for")]
    pub query: String,

    /// Falls back to `retrieval.default_top_k`.
    #[schemars(description = "Maximum number of topics to return (1-50). Defaults to the configured top_k.")]
    pub top_k: Option<usize>,
}
