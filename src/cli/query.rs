use anyhow::Result;

use lorekeep::config::LorekeepConfig;
use lorekeep::knowledge::KnowledgeEngine;

/// Print the topics most relevant to `query`, closest first.
pub fn query(config: &LorekeepConfig, query: &str, top_k: Option<usize>) -> Result<()> {
    let engine = KnowledgeEngine::from_config(config)?;
    let top_k = top_k.unwrap_or_else(|| engine.default_top_k());

    let results = engine.try_get_relevant_knowledge(query, top_k)?;
    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", results.len());
    for (i, hit) in results.iter().enumerate() {
        let topic = &hit.topic;
        println!(
            "  {}. {} [{}] (distance: {:.4}, confidence: {:.2})",
            i + 1,
            topic.name,
            topic.id,
            hit.distance,
            topic.confidence,
        );
        println!("     {}", preview(&topic.definition, 120));
        for fact in &topic.facts {
            println!("     - {fact}");
        }
        println!();
    }

    Ok(())
}

/// Truncate on a char boundary.
fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
