//! MCP server initialization for stdio and Streamable HTTP transports.
//!
//! Provides [`serve_stdio`] and [`serve_http`] entry points that build the
//! knowledge engine and wire it into the MCP tool handler.

use anyhow::{Context, Result};
use rmcp::ServiceExt;
use std::sync::Arc;

use crate::tools::LorekeepTools;
use lorekeep::config::LorekeepConfig;
use lorekeep::knowledge::KnowledgeEngine;

/// Open the store and rebuild the in-memory index. Encoding every stored
/// topic is blocking work, so it runs off the runtime.
async fn build_engine(config: LorekeepConfig) -> Result<Arc<KnowledgeEngine>> {
    let db_path = config.resolved_db_path();
    let engine = tokio::task::spawn_blocking(move || KnowledgeEngine::from_config(&config))
        .await
        .context("engine startup task failed")??;

    let stats = engine.get_stats();
    tracing::info!(
        db = %db_path.display(),
        topics = stats.total_topics,
        model = %stats.embedding_model,
        "knowledge engine loaded"
    );
    if stats.degraded {
        tracing::warn!("index is degraded; run `lorekeep reload`");
    }

    Ok(Arc::new(engine))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: LorekeepConfig) -> Result<()> {
    tracing::info!("starting Lorekeep MCP server on stdio");

    let engine = build_engine(config).await?;
    let tools = LorekeepTools::new(engine);

    let server = tools.serve(rmcp::transport::stdio()).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP, mounted at `/mcp`.
pub async fn serve_http(config: LorekeepConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %bind_addr, "starting Lorekeep MCP server on HTTP");

    let engine = build_engine(config).await?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(LorekeepTools::new(Arc::clone(&engine))),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
