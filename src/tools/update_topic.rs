//! MCP `update_topic` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `update_topic` MCP tool.
///
/// Omitted fields keep their stored values.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateTopicParams {
    #[schemars(description = "ID of the topic to update")]
    pub id: String,

    #[schemars(description = "New unique name. Keeps the current name when omitted.")]
    pub name: Option<String>,

    #[schemars(description = "New definition. The topic is re-embedded and the index rebuilt.")]
    pub definition: Option<String>,

    #[schemars(description = "Replacement list of facts")]
    pub facts: Option<Vec<String>>,

    #[schemars(description = "New confidence 0.0-1.0")]
    pub confidence: Option<f64>,
}
