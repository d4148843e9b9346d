//! CLI `reload` command: re-embed every stored topic and rebuild the index.

use anyhow::{Context, Result};
use std::time::Instant;

use lorekeep::config::LorekeepConfig;
use lorekeep::knowledge::KnowledgeEngine;

/// Opening the engine already reconstructs everything; `reload` does it a
/// second time under the writer lock and reports timing. Useful to confirm
/// that every stored definition still encodes under the configured model.
pub fn reload(config: &LorekeepConfig) -> Result<()> {
    let engine = KnowledgeEngine::from_config(config).context("failed to open knowledge engine")?;

    println!("Re-embedding topics with model '{}'...", engine.embedder().model_id());
    let started = Instant::now();
    let count = engine.reload().context("reload failed")?;

    println!(
        "Reloaded {count} topics in {:.2}s. Index holds {} vectors.",
        started.elapsed().as_secs_f64(),
        engine.get_stats().indexed_vectors
    );
    Ok(())
}
