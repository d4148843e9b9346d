use anyhow::Result;

use lorekeep::config::LorekeepConfig;
use lorekeep::knowledge::KnowledgeEngine;

/// Display knowledge base statistics in the terminal.
pub fn stats(config: &LorekeepConfig, json: bool) -> Result<()> {
    let engine = KnowledgeEngine::from_config(config)?;
    let stats = engine.get_stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Knowledge Statistics");
    println!("{}", "=".repeat(40));
    println!("  Total topics:        {}", stats.total_topics);
    println!("  Indexed vectors:     {}", stats.indexed_vectors);
    println!(
        "  Index:               {}",
        if stats.index_enabled { "enabled" } else { "disabled" }
    );
    println!();

    println!("Embeddings:");
    println!("  Model:               {}", stats.embedding_model);
    match stats.embedding_dimension {
        Some(dim) => println!("  Dimension:           {dim}"),
        None => println!("  Dimension:           (no vectors yet)"),
    }
    println!("  Table entries:       {}", stats.memory_usage.count);
    println!(
        "  Memory usage:        {:.2} MB ({} bytes)",
        stats.memory_usage.memory_size_mb, stats.memory_usage.approx_memory_bytes
    );
    println!();

    println!("Database size:         {} bytes", stats.db_size_bytes);
    println!("Confidence threshold:  {:.2} (advisory)", stats.confidence_threshold);
    if let Some(ref last) = stats.last_updated {
        println!("Last updated:          {last}");
    }
    if stats.degraded {
        println!();
        println!("WARNING: some stored topics are not searchable. Run `lorekeep reload`.");
    }

    Ok(())
}
