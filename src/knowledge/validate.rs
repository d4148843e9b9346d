//! Input validation run before any mutation or encoding.

use super::error::KnowledgeError;
use super::types::Topic;

/// Reject topics missing a name or definition.
pub fn validate_topic(topic: &Topic) -> Result<(), KnowledgeError> {
    if topic.name.trim().is_empty() {
        return Err(KnowledgeError::Validation("topic name must not be empty".into()));
    }
    validate_embedding_input(&topic.definition)
        .map_err(|_| KnowledgeError::Validation("topic definition must not be empty".into()))
}

/// Reject text that is empty after trimming.
pub fn validate_embedding_input(text: &str) -> Result<(), KnowledgeError> {
    if text.trim().is_empty() {
        return Err(KnowledgeError::Validation("text must not be empty".into()));
    }
    Ok(())
}

/// Drop characters other than word characters, whitespace, `-` and `.`,
/// then collapse runs of whitespace to single spaces.
pub fn sanitize_input(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace() || *c == '-' || *c == '.')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
