//! Review Assistant Ingestion
//!
//! Builds the vector index the gateway searches:
//! 1. Loads the review CSV
//! 2. Ensures the pgvector schema exists
//! 3. Embeds reviews in batches
//! 4. Writes them to the store (skipped when already populated)
//!
//! Usage: `ingestion [DATASET_CSV]` (defaults to `ingestion.dataset_path`)

mod dataset;
mod errors;
mod processor;

use anyhow::Context;
use processor::{IndexOptions, IndexOutcome, IndexProcessor};
use reviewqa_common::{
    config::AppConfig,
    db::{DbPool, Repository},
    embeddings, telemetry, VERSION,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    telemetry::init_tracing(&config.observability);

    info!("Starting Review Assistant Ingestion v{}", VERSION);

    let dataset_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.ingestion.dataset_path));

    let reviews = dataset::load_reviews_from_path(&dataset_path)?;

    let db = DbPool::new(&config.database).await?;
    let repository = Repository::new(db);
    let embedder = embeddings::create_embedder(&config.embedding)?;

    let processor = IndexProcessor::new(
        Arc::new(repository),
        embedder,
        IndexOptions::from_config(&config),
    );

    match processor.run(reviews).await? {
        IndexOutcome::Skipped { existing } => {
            info!(existing, "Nothing to do; set APP__INGESTION__REBUILD=true to re-index");
        }
        IndexOutcome::Indexed { reviews, cleared } => {
            info!(reviews, cleared, "Vector store ready");
        }
    }

    Ok(())
}
