//! Review retrieval
//!
//! Maps a question to the most similar stored reviews:
//! embed the question, then ask the vector store for the nearest rows.
//! Rows are adapted into [`ReviewDocument`]s here so callers only ever see
//! the [`Document`] shape.

use crate::db::{Repository, ReviewMatch};
use crate::embeddings::Embedder;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Open mapping of scalar review attributes (rating, date, ...)
pub type Metadata = Map<String, Value>;

/// Anything that can be shown to a caller as `{content, metadata}`
pub trait Document: Send + Sync {
    /// Review text
    fn content(&self) -> &str;

    /// Review attributes
    fn metadata(&self) -> &Metadata;
}

/// A review returned by the vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDocument {
    /// Store identifier, absent for documents built in memory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,

    pub content: String,

    #[serde(default)]
    pub metadata: Metadata,

    /// Cosine similarity to the question (1.0 = identical)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl ReviewDocument {
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: None,
            content: content.into(),
            metadata,
            score: None,
        }
    }
}

impl Document for ReviewDocument {
    fn content(&self) -> &str {
        &self.content
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl From<ReviewMatch> for ReviewDocument {
    fn from(row: ReviewMatch) -> Self {
        // Anything other than a JSON object is treated as "no metadata"
        let metadata = match row.metadata {
            Value::Object(map) => map,
            _ => Metadata::new(),
        };

        Self {
            id: Some(row.id),
            content: row.content,
            metadata,
            score: Some(row.score),
        }
    }
}

/// Maps a question to relevant stored documents
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Most relevant first; an empty result is not an error
    async fn retrieve(&self, question: &str) -> Result<Vec<ReviewDocument>>;

    /// Check the backing store is reachable
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Similarity lookup over stored reviews
#[async_trait]
pub trait ReviewIndex: Send + Sync {
    /// The `limit` closest reviews, nearest first
    async fn nearest(&self, embedding: &[f32], limit: usize) -> Result<Vec<ReviewMatch>>;

    /// Distinct embedding models the stored vectors were built with
    async fn embedding_models(&self) -> Result<Vec<String>>;

    async fn ping(&self) -> Result<()>;
}

#[async_trait]
impl ReviewIndex for Repository {
    async fn nearest(&self, embedding: &[f32], limit: usize) -> Result<Vec<ReviewMatch>> {
        self.nearest_reviews(embedding, limit).await
    }

    async fn embedding_models(&self) -> Result<Vec<String>> {
        Repository::embedding_models(self).await
    }

    async fn ping(&self) -> Result<()> {
        Repository::ping(self).await
    }
}

/// Retriever backed by pgvector cosine distance
pub struct VectorRetriever {
    index: Arc<dyn ReviewIndex>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl VectorRetriever {
    /// Create a new vector retriever returning `top_k` reviews per question
    pub fn new(index: Arc<dyn ReviewIndex>, embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self { index, embedder, top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Fail when stored vectors came from a different model than the query embedder.
    ///
    /// An empty store passes.
    pub async fn check_embedding_model(&self) -> Result<()> {
        let models = self.index.embedding_models().await?;
        match mismatched_models(&models, self.embedder.model_name()) {
            None => Ok(()),
            Some(found) => Err(AppError::Configuration {
                message: format!(
                    "Index was built with {} but queries use {}; re-run ingestion with rebuild",
                    found,
                    self.embedder.model_name()
                ),
            }),
        }
    }
}

/// Models in `stored` other than `expected`, joined for display
fn mismatched_models(stored: &[String], expected: &str) -> Option<String> {
    let others: Vec<&str> = stored
        .iter()
        .map(String::as_str)
        .filter(|m| *m != expected)
        .collect();
    (!others.is_empty()).then(|| others.join(", "))
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, question: &str) -> Result<Vec<ReviewDocument>> {
        let embedding = self.embedder.embed(question).await?;
        let rows = self.index.nearest(&embedding, self.top_k).await?;

        tracing::debug!(
            results = rows.len(),
            top_score = rows.first().map(|r| r.score),
            "Vector lookup completed"
        );

        Ok(rows.into_iter().map(ReviewDocument::from).collect())
    }

    async fn ping(&self) -> Result<()> {
        self.index.ping().await?;
        self.check_embedding_model().await
    }
}
