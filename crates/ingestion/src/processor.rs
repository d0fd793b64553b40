//! Index processor
//!
//! Embeds dataset reviews in batches and writes them to the vector store.
//! A normal run only embeds rows the store is missing, so an interrupted run
//! resumes where it stopped. A rebuild embeds everything first and then swaps
//! the store contents in one step.

use crate::dataset::DatasetReview;
use crate::errors::IngestionError;
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use futures::stream::{self, Stream, StreamExt};
use reviewqa_common::config::AppConfig;
use reviewqa_common::db::{NewReview, Repository};
use reviewqa_common::embeddings::Embedder;
use reviewqa_common::errors::{AppError, Result};
use reviewqa_common::metrics;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Storage operations needed to build the index
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Create tables and indexes if missing
    async fn prepare(&self, dimension: usize) -> Result<()>;

    /// Row indices already stored
    async fn indexed_rows(&self) -> Result<Vec<i32>>;

    /// Add reviews, ignoring row indices that are already present
    async fn insert(&self, reviews: Vec<NewReview>, embedding_model: &str) -> Result<usize>;

    /// Atomically replace every stored review; returns (cleared, written)
    async fn replace(&self, reviews: Vec<NewReview>, embedding_model: &str) -> Result<(u64, usize)>;
}

#[async_trait]
impl ReviewStore for Repository {
    async fn prepare(&self, dimension: usize) -> Result<()> {
        self.ensure_schema(dimension).await
    }

    async fn indexed_rows(&self) -> Result<Vec<i32>> {
        self.indexed_row_indices().await
    }

    async fn insert(&self, reviews: Vec<NewReview>, embedding_model: &str) -> Result<usize> {
        self.insert_reviews(reviews, embedding_model).await
    }

    async fn replace(&self, reviews: Vec<NewReview>, embedding_model: &str) -> Result<(u64, usize)> {
        self.replace_reviews(reviews, embedding_model).await
    }
}

/// Index build settings
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Reviews per embedding request
    pub batch_size: usize,
    /// Embedding requests in flight
    pub concurrency: usize,
    /// Retries per batch after the first attempt
    pub max_retries: u32,
    /// First retry delay, doubled on each retry
    pub retry_interval: Duration,
    /// Replace the store contents instead of filling in missing rows
    pub rebuild: bool,
}

impl IndexOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            batch_size: config.embedding.batch_size,
            concurrency: config.ingestion.concurrency,
            max_retries: config.ingestion.max_retries,
            retry_interval: Duration::from_millis(200),
            rebuild: config.ingestion.rebuild,
        }
    }
}

/// What a run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Every dataset row was already stored and no rebuild was requested
    Skipped { existing: u64 },
    /// Reviews were embedded and written
    Indexed { reviews: usize, cleared: u64 },
}

/// Builds the review index
pub struct IndexProcessor {
    store: Arc<dyn ReviewStore>,
    embedder: Arc<dyn Embedder>,
    options: IndexOptions,
}

impl IndexProcessor {
    pub fn new(store: Arc<dyn ReviewStore>, embedder: Arc<dyn Embedder>, options: IndexOptions) -> Self {
        Self { store, embedder, options }
    }

    /// Index the rows of `reviews` the store does not have yet, or all of
    /// them when rebuilding
    #[instrument(skip_all, fields(reviews = reviews.len(), rebuild = self.options.rebuild))]
    pub async fn run(&self, reviews: Vec<DatasetReview>) -> std::result::Result<IndexOutcome, IngestionError> {
        self.store.prepare(self.embedder.dimension()).await?;

        if self.options.rebuild {
            return self.rebuild(reviews).await;
        }

        let stored: HashSet<i32> = self.store.indexed_rows().await?.into_iter().collect();
        let existing = stored.len() as u64;
        let missing: Vec<DatasetReview> = reviews
            .into_iter()
            .filter(|r| !stored.contains(&r.row_index))
            .collect();

        if missing.is_empty() {
            info!(existing, "Vector store already complete, skipping indexing");
            return Ok(IndexOutcome::Skipped { existing });
        }
        if existing > 0 {
            info!(existing, missing = missing.len(), "Resuming partially built index");
        }

        let total = missing.len();
        let mut embedded = std::pin::pin!(self.embedded_batches(missing));

        // Batches are committed as they arrive so progress survives a failure
        let mut indexed = 0;
        while let Some(batch) = embedded.next().await {
            let written = self.store.insert(batch?, self.embedder.model_name()).await?;
            indexed += written;
            metrics::record_indexed(written);
            info!(indexed, total, "Indexed batch");
        }

        info!(indexed, "Index build complete");
        Ok(IndexOutcome::Indexed { reviews: indexed, cleared: 0 })
    }

    /// Embed every review, then swap the store contents in one transaction.
    /// A failure leaves the previous index untouched.
    async fn rebuild(&self, reviews: Vec<DatasetReview>) -> std::result::Result<IndexOutcome, IngestionError> {
        let total = reviews.len();
        let mut rows = Vec::with_capacity(total);
        let mut embedded = std::pin::pin!(self.embedded_batches(reviews));

        while let Some(batch) = embedded.next().await {
            rows.extend(batch?);
            info!(embedded = rows.len(), total, "Embedded batch");
        }

        let (cleared, written) = self.store.replace(rows, self.embedder.model_name()).await?;
        metrics::record_indexed(written);

        info!(cleared, indexed = written, "Index rebuilt");
        Ok(IndexOutcome::Indexed { reviews: written, cleared })
    }

    /// Embed batches concurrently, yielding them in dataset order
    fn embedded_batches(
        &self,
        reviews: Vec<DatasetReview>,
    ) -> impl Stream<Item = std::result::Result<Vec<NewReview>, IngestionError>> + '_ {
        let batches: Vec<Vec<DatasetReview>> = reviews
            .chunks(self.options.batch_size.max(1))
            .map(|chunk| chunk.to_vec())
            .collect();

        stream::iter(batches)
            .map(move |batch| self.embed_batch(batch))
            .buffered(self.options.concurrency.max(1))
    }

    async fn embed_batch(&self, batch: Vec<DatasetReview>) -> std::result::Result<Vec<NewReview>, IngestionError> {
        let texts: Vec<String> = batch.iter().map(|r| r.content.clone()).collect();
        let embeddings = self.embed_with_retry(&texts).await?;

        Ok(batch
            .into_iter()
            .zip(embeddings)
            .map(|(review, embedding)| NewReview {
                row_index: review.row_index,
                content: review.content,
                metadata: Value::Object(review.metadata),
                embedding,
            })
            .collect())
    }

    async fn embed_with_retry(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, IngestionError> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.options.retry_interval)
            .with_multiplier(2.0)
            .with_max_elapsed_time(None)
            .build();

        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let embedder = &self.embedder;
        let max_retries = self.options.max_retries;

        backoff::future::retry_notify(
            policy,
            move || async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                embedder.embed_batch(texts).await.map_err(|e| {
                    if attempt < max_retries && is_transient(&e) {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            },
            |e: AppError, wait: Duration| {
                warn!(error = %e, retry_in_ms = wait.as_millis() as u64, "Embedding batch failed, retrying");
            },
        )
        .await
        .map_err(IngestionError::Embedding)
    }
}

/// Network-level embedding failures are worth retrying
fn is_transient(e: &AppError) -> bool {
    matches!(e, AppError::EmbeddingError { .. } | AppError::EmbeddingTimeout { .. })
}
