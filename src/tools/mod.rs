pub mod add_topic;
pub mod get_relevant_knowledge;
pub mod update_topic;

use std::sync::Arc;

use add_topic::AddTopicParams;
use get_relevant_knowledge::GetRelevantKnowledgeParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use update_topic::UpdateTopicParams;

use lorekeep::knowledge::{KnowledgeEngine, Topic};

const MAX_TOP_K: usize = 50;

/// The Lorekeep MCP tool handler. Holds the shared engine and exposes it via
/// the `#[tool_router]` macro.
#[derive(Clone)]
pub struct LorekeepTools {
    tool_router: ToolRouter<Self>,
    engine: Arc<KnowledgeEngine>,
}

/// Run a blocking engine call off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, String>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| format!("engine task failed: {e}"))
}

#[tool_router]
impl LorekeepTools {
    pub fn new(engine: Arc<KnowledgeEngine>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            engine,
        }
    }

    /// Add a new topic to the knowledge base.
    #[tool(description = "Add a knowledge topic. The definition is embedded and becomes searchable immediately. Topic names must be unique.")]
    async fn add_topic(
        &self,
        Parameters(params): Parameters<AddTopicParams>,
    ) -> Result<String, String> {
        tracing::info!(name = %params.name, "add_topic called");

        let mut topic = Topic::new(params.name, params.definition, params.facts.unwrap_or_default())
            .with_confidence(params.confidence.unwrap_or(0.0));
        if let Some(id) = params.id {
            topic = topic.with_id(id);
        }

        let engine = Arc::clone(&self.engine);
        let stored = blocking(move || engine.add_topic(topic))
            .await?
            .map_err(|e| format!("add failed: {e}"))?;

        serde_json::to_string(&stored).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Update an existing topic; omitted fields keep their stored values.
    #[tool(description = "Update a topic by ID. Only the fields given are changed. Changing the definition re-embeds the topic.")]
    async fn update_topic(
        &self,
        Parameters(params): Parameters<UpdateTopicParams>,
    ) -> Result<String, String> {
        tracing::info!(id = %params.id, "update_topic called");

        let engine = Arc::clone(&self.engine);
        let stored = blocking(move || {
            let UpdateTopicParams {
                id,
                name,
                definition,
                facts,
                confidence,
            } = params;
            engine.update_topic_with(&id, |current| Topic {
                name: name.unwrap_or(current.name),
                definition: definition.unwrap_or(current.definition),
                facts: facts.unwrap_or(current.facts),
                confidence: confidence.unwrap_or(current.confidence),
                ..current
            })
        })
        .await?
        .map_err(|e| format!("update failed: {e}"))?;

        serde_json::to_string(&stored).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Find the topics most relevant to a piece of text.
    #[tool(description = "Find the knowledge topics most relevant to a query, closest first. Each result carries its squared embedding distance.")]
    async fn get_relevant_knowledge(
        &self,
        Parameters(params): Parameters<GetRelevantKnowledgeParams>,
    ) -> Result<String, String> {
        let top_k = params
            .top_k
            .unwrap_or_else(|| self.engine.default_top_k())
            .clamp(1, MAX_TOP_K);
        tracing::info!(query = %params.query, top_k, "get_relevant_knowledge called");

        let engine = Arc::clone(&self.engine);
        let query = params.query;
        let results = blocking(move || engine.try_get_relevant_knowledge(&query, top_k))
            .await?
            .map_err(|e| format!("retrieval failed: {e}"))?;

        Ok(serde_json::json!({
            "total": results.len(),
            "results": results,
        })
        .to_string())
    }

    /// Report knowledge base statistics.
    #[tool(description = "Get knowledge base statistics: topic count, indexed vectors, embedding model and dimension, memory usage.")]
    async fn knowledge_stats(&self) -> Result<String, String> {
        tracing::info!("knowledge_stats called");
        let engine = Arc::clone(&self.engine);
        let stats = blocking(move || engine.get_stats()).await?;
        serde_json::to_string(&stats).map_err(|e| format!("serialization failed: {e}"))
    }
}

#[tool_handler]
impl ServerHandler for LorekeepTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Lorekeep is a knowledge base for agents. Use get_relevant_knowledge before \
                 answering to pull in matching topics, add_topic to record new knowledge, and \
                 update_topic to correct it."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
