use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::path::Path;

use lorekeep::config::LorekeepConfig;
use lorekeep::knowledge::{KnowledgeEngine, KnowledgeError, Topic};

/// Accepts `lorekeep export` output or a bare array of topics.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportData {
    Wrapped { topics: Vec<Topic> },
    Bare(Vec<Topic>),
}

impl ImportData {
    fn into_topics(self) -> Vec<Topic> {
        match self {
            Self::Wrapped { topics } | Self::Bare(topics) => topics,
        }
    }
}

/// Import topics from a JSON file.
///
/// Each topic is re-embedded with the configured provider. Topics whose ID or
/// name already exists are skipped; `created_at` in the file is ignored.
pub fn import(config: &LorekeepConfig, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read import file: {}", file.display()))?;
    let topics = serde_json::from_str::<ImportData>(&json)
        .context("failed to parse import JSON")?
        .into_topics();

    let engine = KnowledgeEngine::from_config(config)?;

    println!("Importing {} topics...", topics.len());
    let pb = ProgressBar::new(topics.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} ({eta})")
            .expect("valid template")
            .progress_chars("##-"),
    );

    let mut imported = 0u64;
    let mut skipped = 0u64;
    let mut failed = 0u64;

    for topic in topics {
        let name = topic.name.clone();
        if engine.get_topic(&topic.id)?.is_some() {
            skipped += 1;
            pb.inc(1);
            continue;
        }

        match engine.add_topic(topic) {
            Ok(_) => imported += 1,
            Err(KnowledgeError::DuplicateName(_)) => skipped += 1,
            Err(e) => {
                pb.suspend(|| eprintln!("Warning: failed to import '{name}': {e}"));
                failed += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!("Import complete:");
    println!("  Topics imported: {imported}");
    println!("  Topics skipped:  {skipped} (already exist)");
    if failed > 0 {
        println!("  Topics failed:   {failed}");
    }
    if engine.is_degraded() {
        println!("  WARNING: index is degraded. Run `lorekeep reload`.");
    }

    Ok(())
}
