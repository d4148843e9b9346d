//! Durable topic records in SQLite.
//!
//! [`TopicStore`] holds only the database path: every operation opens its own
//! connection and releases it before returning, so no transaction ever spans
//! two calls. Mutations are committed before `Ok` is returned.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use thiserror::Error;

use super::types::Topic;
use crate::db::{self, migrations, schema};

/// SQLite caps bound parameters per statement; stay well under it.
const ID_CHUNK: usize = 500;

const TOPIC_COLUMNS: &str = "id, name, definition, facts, confidence, created_at";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a topic named {0:?} already exists")]
    DuplicateName(String),

    #[error("a topic with id {0:?} already exists")]
    DuplicateId(String),

    #[error("topic not found: {0}")]
    NotFound(String),

    #[error("sqlite: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("facts serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct TopicStore {
    path: PathBuf,
}

impl TopicStore {
    /// Point at a database file. Nothing is touched until [`initialize`](Self::initialize).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Per-operation connection. Never creates the file; only
    /// [`initialize`](Self::initialize) does.
    fn connect(&self) -> Result<Connection, StoreError> {
        Ok(db::connect_existing(&self.path)?)
    }

    /// Create the database file, schema, and pending migrations. Safe to call
    /// on every start; existing rows are never touched.
    pub fn initialize(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = db::connect(&self.path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        schema::init_schema(&conn)?;
        migrations::run_migrations(&conn)?;
        tracing::debug!(path = %self.path.display(), "topic store initialized");
        Ok(())
    }

    /// Insert a new topic. Returns it with `created_at` filled in.
    pub fn insert(&self, topic: &Topic) -> Result<Topic, StoreError> {
        let conn = self.connect()?;
        let now = timestamp_now();
        let facts = serde_json::to_string(&topic.facts)?;

        conn.execute(
            "INSERT INTO topics (id, name, definition, facts, confidence, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![topic.id, topic.name, topic.definition, facts, topic.confidence, now],
        )
        .map_err(|e| constraint_error(e, topic))?;

        Ok(Topic {
            created_at: Some(now),
            ..topic.clone()
        })
    }

    /// Replace the row for `topic.id`. `created_at` is kept from the stored row;
    /// whatever the caller passed there is ignored.
    pub fn update(&self, topic: &Topic) -> Result<Topic, StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let facts = serde_json::to_string(&topic.facts)?;

        let rows = tx
            .execute(
                "UPDATE topics SET name = ?1, definition = ?2, facts = ?3, confidence = ?4, \
                 updated_at = ?5 WHERE id = ?6",
                params![
                    topic.name,
                    topic.definition,
                    facts,
                    topic.confidence,
                    timestamp_now(),
                    topic.id
                ],
            )
            .map_err(|e| constraint_error(e, topic))?;
        if rows == 0 {
            return Err(StoreError::NotFound(topic.id.clone()));
        }

        let created_at: String = tx.query_row(
            "SELECT created_at FROM topics WHERE id = ?1",
            params![topic.id],
            |row| row.get(0),
        )?;
        tx.commit()?;

        Ok(Topic {
            created_at: Some(created_at),
            ..topic.clone()
        })
    }

    pub fn get(&self, id: &str) -> Result<Option<Topic>, StoreError> {
        let conn = self.connect()?;
        let topic = conn
            .query_row(
                &format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE id = ?1"),
                params![id],
                row_to_topic,
            )
            .optional()?;
        Ok(topic)
    }

    /// Fetch topics in the order of `ids`. Unknown ids are skipped.
    pub fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Topic>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let conn = self.connect()?;

        let mut found: HashMap<String, Topic> = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(ID_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT {TOPIC_COLUMNS} FROM topics WHERE id IN ({placeholders})"
            ))?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), row_to_topic)?
                .collect::<Result<Vec<_>, _>>()?;
            for topic in rows {
                found.insert(topic.id.clone(), topic);
            }
        }

        Ok(ids.iter().filter_map(|id| found.get(id).cloned()).collect())
    }

    /// Every stored topic, oldest insert first.
    pub fn all(&self) -> Result<Vec<Topic>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!("SELECT {TOPIC_COLUMNS} FROM topics ORDER BY rowid"))?;
        let topics = stmt
            .query_map([], row_to_topic)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(topics)
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM topics", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Most recent insert or update instant, `None` for an empty store.
    pub fn last_update_time(&self) -> Result<Option<String>, StoreError> {
        let conn = self.connect()?;
        let last: Option<String> = conn.query_row(
            "SELECT MAX(COALESCE(updated_at, created_at)) FROM topics",
            [],
            |row| row.get(0),
        )?;
        Ok(last)
    }

    pub fn embedding_model(&self) -> Result<Option<String>, StoreError> {
        let conn = self.connect()?;
        Ok(migrations::get_embedding_model(&conn)?)
    }

    pub fn record_embedding_model(&self, model: &str, dimension: usize) -> Result<(), StoreError> {
        let conn = self.connect()?;
        migrations::set_embedding_model(&conn, model, dimension)?;
        Ok(())
    }
}

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn row_to_topic(row: &Row<'_>) -> rusqlite::Result<Topic> {
    let facts_json: String = row.get(3)?;
    let facts: Vec<String> = serde_json::from_str(&facts_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Topic {
        id: row.get(0)?,
        name: row.get(1)?,
        definition: row.get(2)?,
        facts,
        confidence: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Turn uniqueness violations into the contract errors callers match on.
fn constraint_error(err: rusqlite::Error, topic: &Topic) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
        match failure.extended_code {
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => {
                return StoreError::DuplicateName(topic.name.clone())
            }
            rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                return StoreError::DuplicateId(topic.id.clone())
            }
            _ => {}
        }
    }
    StoreError::Storage(err)
}
