//! Error types for the storage layer

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LakeError {
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage-layer operations
pub type Result<T> = std::result::Result<T, LakeError>;
