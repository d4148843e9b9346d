//! MCP `add_topic` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `add_topic` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AddTopicParams {
    #[schemars(description = "Unique topic name, e.g. 'greetings'")]
    pub name: String,

    #[schemars(description = "Free-text definition. This is the text that gets embedded and searched.")]
    pub definition: String,

    #[schemars(description = "Optional supporting statements, kept in order")]
    pub facts: Option<Vec<String>>,

    #[schemars(description = "Optional caller-supplied confidence 0.0-1.0. Stored as given. Defaults to 0.0.")]
    pub confidence: Option<f64>,

    #[schemars(description = "Optional explicit topic ID. A UUID is generated when omitted.")]
    pub id: Option<String>,
}
