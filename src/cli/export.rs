use anyhow::Result;
use serde::Serialize;

use lorekeep::config::LorekeepConfig;
use lorekeep::knowledge::{Topic, TopicStore};

/// Export format. `lorekeep import` reads it back.
#[derive(Debug, Serialize)]
struct ExportData {
    topics: Vec<Topic>,
}

/// Export all topics as JSON to stdout.
///
/// Reads the store directly; no embedding model is loaded.
pub fn export(config: &LorekeepConfig) -> Result<()> {
    let store = TopicStore::new(config.resolved_db_path());
    store.initialize()?;

    let data = ExportData {
        topics: store.all()?,
    };

    println!("{}", serde_json::to_string_pretty(&data)?);
    eprintln!("Exported {} topics.", data.topics.len());
    Ok(())
}
