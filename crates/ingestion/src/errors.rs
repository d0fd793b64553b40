//! Ingestion error types

use reviewqa_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Dataset error at line {line}: {message}")]
    Dataset { line: u64, message: String },

    #[error("Dataset file not found: {0}")]
    FileNotFound(String),

    #[error("Embedding error: {0}")]
    Embedding(AppError),

    #[error("Vector store error: {0}")]
    Store(AppError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<csv::Error> for IngestionError {
    fn from(e: csv::Error) -> Self {
        let line = e.position().map(|p| p.line()).unwrap_or_default();
        IngestionError::Dataset {
            line,
            message: e.to_string(),
        }
    }
}

impl From<AppError> for IngestionError {
    fn from(e: AppError) -> Self {
        IngestionError::Store(e)
    }
}
