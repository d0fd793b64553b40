//! Review Assistant Common Library
//!
//! Shared code for the gateway and ingestion binaries including:
//! - Configuration management
//! - Error types and handling
//! - Embedding client abstraction
//! - Vector store access (PostgreSQL + pgvector)
//! - Review retrieval and LLM answering
//! - Metrics and logging setup

pub mod config;
pub mod db;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod retrieval;
pub mod telemetry;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use embeddings::Embedder;
pub use llm::Answerer;
pub use retrieval::{Document, ReviewDocument, Retriever};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "mxbai-embed-large";

/// Default embedding dimension (mxbai-embed-large)
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1024;

/// Default language model
pub const DEFAULT_LLM_MODEL: &str = "llama3.2";
