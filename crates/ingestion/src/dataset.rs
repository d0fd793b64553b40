//! Review dataset loader
//!
//! Reads the restaurant review CSV (`Title,Date,Rating,Review`) and turns
//! each row into the text and metadata that get embedded.

use crate::errors::IngestionError;
use reviewqa_common::retrieval::Metadata;
use serde::Deserialize;
use serde_json::Value;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// One CSV row as written in the dataset
#[derive(Debug, Deserialize)]
struct ReviewRecord {
    #[serde(rename = "Title", default)]
    title: String,
    #[serde(rename = "Date", default)]
    date: String,
    #[serde(rename = "Rating", default)]
    rating: String,
    #[serde(rename = "Review", default)]
    review: String,
}

/// A dataset row ready for embedding
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetReview {
    /// Zero-based position in the file, used as the stable store key
    pub row_index: i32,
    pub content: String,
    pub metadata: Metadata,
}

impl ReviewRecord {
    fn into_review(self, row_index: i32) -> Option<DatasetReview> {
        let title = self.title.trim();
        let review = self.review.trim();
        if title.is_empty() && review.is_empty() {
            return None;
        }

        let content = match (title.is_empty(), review.is_empty()) {
            (false, false) => format!("{} {}", title, review),
            (true, _) => review.to_string(),
            (_, true) => title.to_string(),
        };

        let mut metadata = Metadata::new();
        let rating = self.rating.trim();
        if !rating.is_empty() {
            let value = rating
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::from(rating));
            metadata.insert("rating".to_string(), value);
        }
        let date = self.date.trim();
        if !date.is_empty() {
            metadata.insert("date".to_string(), Value::from(date));
        }

        Some(DatasetReview {
            row_index,
            content,
            metadata,
        })
    }
}

/// Parse reviews from any CSV reader with a header row
pub fn load_reviews<R: Read>(reader: R) -> Result<Vec<DatasetReview>, IngestionError> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv.headers()?.clone();
    let mut record = csv::StringRecord::new();
    let mut reviews = Vec::new();
    let mut index = 0usize;

    while csv.read_record(&mut record)? {
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row_index = row_index(index, line)?;
        index += 1;

        let row: ReviewRecord = record.deserialize(Some(&headers))?;
        match row.into_review(row_index) {
            Some(review) => reviews.push(review),
            None => warn!(row = row_index, line, "Skipping review row with no title or text"),
        }
    }

    Ok(reviews)
}

/// Row positions are stored as INTEGER
fn row_index(index: usize, line: u64) -> Result<i32, IngestionError> {
    i32::try_from(index).map_err(|_| IngestionError::Dataset {
        line,
        message: format!("row {} exceeds the supported dataset size", index),
    })
}

/// Load the dataset from disk
pub fn load_reviews_from_path(path: &Path) -> Result<Vec<DatasetReview>, IngestionError> {
    if !path.exists() {
        return Err(IngestionError::FileNotFound(path.display().to_string()));
    }

    let file = std::fs::File::open(path)?;
    let reviews = load_reviews(std::io::BufReader::new(file))?;
    info!(path = %path.display(), reviews = reviews.len(), "Loaded review dataset");
    Ok(reviews)
}
