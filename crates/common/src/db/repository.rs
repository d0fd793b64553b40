//! Repository for vector store operations
//!
//! Wraps schema setup, bulk indexing and the cosine similarity lookup
//! used by the retriever.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, PaginatorTrait, QueryOrder,
    QueryResult, QuerySelect, Statement, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A review ready to be written to the store
#[derive(Debug, Clone)]
pub struct NewReview {
    pub row_index: i32,
    pub content: String,
    pub metadata: serde_json::Value,
    pub embedding: Vec<f32>,
}

/// Result from similarity lookups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewMatch {
    pub id: Uuid,
    pub content: String,
    pub metadata: serde_json::Value,
    pub score: f64,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Schema
    // ========================================================================

    /// Create the `vector` extension, the reviews table and its HNSW index
    pub async fn ensure_schema(&self, dimension: usize) -> Result<()> {
        for sql in schema_statements(dimension) {
            self.conn().execute_unprepared(&sql).await?;
        }
        Ok(())
    }

    // ========================================================================
    // Indexing
    // ========================================================================

    /// Number of stored reviews
    pub async fn count_reviews(&self) -> Result<u64> {
        ReviewEntity::find()
            .count(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Row indices already present, ascending
    pub async fn indexed_row_indices(&self) -> Result<Vec<i32>> {
        ReviewEntity::find()
            .select_only()
            .column(ReviewColumn::RowIndex)
            .order_by_asc(ReviewColumn::RowIndex)
            .into_tuple::<i32>()
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Distinct embedding models recorded in the store
    pub async fn embedding_models(&self) -> Result<Vec<String>> {
        ReviewEntity::find()
            .select_only()
            .column(ReviewColumn::EmbeddingModel)
            .distinct()
            .into_tuple::<String>()
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Insert a batch of embedded reviews in one transaction
    pub async fn insert_reviews(&self, reviews: Vec<NewReview>, embedding_model: &str) -> Result<usize> {
        let txn = self.conn().begin().await?;
        let count = insert_rows(&txn, reviews, embedding_model).await?;
        txn.commit().await?;
        Ok(count)
    }

    /// Swap the whole store for `reviews` in one transaction.
    ///
    /// Returns the number of rows removed and written.
    pub async fn replace_reviews(&self, reviews: Vec<NewReview>, embedding_model: &str) -> Result<(u64, usize)> {
        let txn = self.conn().begin().await?;
        let cleared = ReviewEntity::delete_many().exec(&txn).await?.rows_affected;
        let written = insert_rows(&txn, reviews, embedding_model).await?;
        txn.commit().await?;
        Ok((cleared, written))
    }

    // ========================================================================
    // Similarity lookup
    // ========================================================================

    /// Return the `limit` reviews closest to `embedding` by cosine distance
    pub async fn nearest_reviews(&self, embedding: &[f32], limit: usize) -> Result<Vec<ReviewMatch>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT
                id,
                content,
                metadata,
                1 - (embedding <=> $1::vector) AS score
            FROM reviews
            ORDER BY embedding <=> $1::vector
            LIMIT $2
            "#,
            vec![
                vector_literal(embedding).into(),
                (limit as i64).into(),
            ],
        );

        let rows = self.conn().query_all(stmt).await?;

        Ok(rows.iter().filter_map(review_match_from_row).collect())
    }
}

async fn insert_rows<C: ConnectionTrait>(conn: &C, reviews: Vec<NewReview>, embedding_model: &str) -> Result<usize> {
    let count = reviews.len();

    for review in reviews {
        // Use raw SQL for pgvector type
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO reviews (
                id, row_index, content, metadata, embedding, embedding_model, created_at
            )
            VALUES ($1, $2, $3, $4, $5::vector, $6, NOW())
            ON CONFLICT (row_index) DO NOTHING
            "#,
            vec![
                Uuid::new_v4().into(),
                review.row_index.into(),
                review.content.into(),
                review.metadata.into(),
                vector_literal(&review.embedding).into(),
                embedding_model.into(),
            ],
        );

        conn.execute(stmt).await?;
    }

    Ok(count)
}

/// DDL for the reviews table, parameterized by embedding dimension
fn schema_statements(dimension: usize) -> Vec<String> {
    vec![
        "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS reviews (
                id UUID PRIMARY KEY,
                row_index INTEGER NOT NULL UNIQUE,
                content TEXT NOT NULL,
                metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                embedding vector({dimension}) NOT NULL,
                embedding_model TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
        ),
        "CREATE INDEX IF NOT EXISTS reviews_embedding_idx ON reviews USING hnsw (embedding vector_cosine_ops)"
            .to_string(),
    ]
}

/// Convert Vec<f32> to pgvector text format "[1.0,2.0,...]"
fn vector_literal(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding.iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

fn review_match_from_row(row: &QueryResult) -> Option<ReviewMatch> {
    let id = row.try_get::<Uuid>("", "id").ok()?;
    let content = match row.try_get::<String>("", "content") {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(%id, error = %e, "Skipping review row without content");
            return None;
        }
    };

    Some(ReviewMatch {
        id,
        content,
        metadata: row
            .try_get::<serde_json::Value>("", "metadata")
            .unwrap_or(serde_json::Value::Null),
        score: row.try_get::<f64>("", "score").unwrap_or_default(),
    })
}
