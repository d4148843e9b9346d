//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use lorekeep::config::LorekeepConfig;
use lorekeep::db;
use lorekeep::embedding;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &LorekeepConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `lorekeep add` or `lorekeep import` to create it.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("Lorekeep Health Report");
    println!("======================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("Topics:            {}", report.topic_count);
    println!();

    println!("Embedding model:");
    println!("  Stored:          {}", report.embedding_model.as_deref().unwrap_or("(not set)"));
    if let Some(dim) = report.embedding_dimension {
        println!("  Dimension:       {dim}");
    }
    match embedding::create_provider(&config.embedding) {
        Ok(provider) => {
            println!("  Configured:      {}", provider.model_id());
            match report.embedding_model {
                Some(ref stored) if stored != provider.model_id() => println!(
                    "  NOTE: model changed. Vectors are regenerated on every start, so results now follow the configured model."
                ),
                Some(_) => println!("  Status:          OK (match)"),
                None => {}
            }
        }
        Err(e) => {
            println!("  Configured:      {} (unavailable: {e})", config.embedding.provider);
            if config.embedding.provider == "local" {
                println!("  Run `lorekeep model download` to fetch the model files.");
            }
        }
    }
    println!();

    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db {}", db_path.display());
        println!("  2. Or export from a good copy and reimport:");
        println!("     lorekeep export > backup.json");
        println!("     lorekeep import backup.json");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
