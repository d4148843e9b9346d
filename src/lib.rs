//! Knowledge indexing and retrieval for conversational agents.
//!
//! Lorekeep stores named [`Topic`](knowledge::Topic)s in SQLite, embeds each
//! topic's definition into a fixed-dimension vector, and answers "which topics
//! are relevant to this text?" with an exact nearest-neighbor search over those
//! vectors. It ships as a library, a CLI, and an [MCP](https://modelcontextprotocol.io/)
//! server.
//!
//! # Architecture
//!
//! - **Storage**: SQLite, one row per topic; the database is the only durable state
//! - **Embeddings**: Local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions), or a
//!   model-free feature-hashing embedder
//! - **Index**: In-memory squared-Euclidean index rebuilt from the store on start
//! - **Transport**: MCP over stdio (primary) or Streamable HTTP
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite database initialization, schema, migrations, and health checks
//! - [`embedding`]: Text-to-vector embedding providers
//! - [`knowledge`]: Topic store, embedding table, similarity index, and the engine tying them together

pub mod config;
pub mod db;
pub mod embedding;
pub mod knowledge;
