//! CLI `add` and `update` commands.

use anyhow::{Context, Result};

use lorekeep::config::LorekeepConfig;
use lorekeep::knowledge::{KnowledgeEngine, Topic};

/// Add one topic and print it as JSON.
pub fn add(
    config: &LorekeepConfig,
    name: String,
    definition: String,
    facts: Vec<String>,
    confidence: f64,
) -> Result<()> {
    let engine = KnowledgeEngine::from_config(config)?;
    let topic = Topic::new(name, definition, facts).with_confidence(confidence);
    let stored = engine.add_topic(topic).context("failed to add topic")?;

    println!("{}", serde_json::to_string_pretty(&stored)?);
    eprintln!("Added topic '{}' ({}).", stored.name, stored.id);
    Ok(())
}

/// Field overrides for [`update`]. `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct TopicChanges {
    pub name: Option<String>,
    pub definition: Option<String>,
    pub facts: Option<Vec<String>>,
    pub confidence: Option<f64>,
}

/// Apply changes to an existing topic, re-embed it, and rebuild the index.
pub fn update(config: &LorekeepConfig, id: &str, changes: TopicChanges) -> Result<()> {
    let engine = KnowledgeEngine::from_config(config)?;
    let updated = engine
        .update_topic_with(id, |current| Topic {
            name: changes.name.unwrap_or(current.name),
            definition: changes.definition.unwrap_or(current.definition),
            facts: changes.facts.unwrap_or(current.facts),
            confidence: changes.confidence.unwrap_or(current.confidence),
            ..current
        })
        .with_context(|| format!("failed to update topic {id}"))?;

    println!("{}", serde_json::to_string_pretty(&updated)?);
    eprintln!("Updated topic '{}'.", updated.name);
    Ok(())
}
