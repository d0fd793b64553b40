//! Review entity
//!
//! The `embedding` column is a pgvector `vector(n)` and is not mapped here;
//! it is written and queried through raw SQL in the repository.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reviews")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Position of the review in the source dataset
    #[sea_orm(unique)]
    pub row_index: i32,

    /// Text that was embedded ("<title> <review>")
    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// Scalar attributes such as rating and date
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,

    /// Embedding model identifier, checked against the query embedder
    #[sea_orm(column_type = "Text")]
    pub embedding_model: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
