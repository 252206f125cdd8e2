use crate::semantic::{EmbeddingError, SemanticSearchError};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Search(#[from] SemanticSearchError),

    #[error("embedding client error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("invalid search options: {0}")]
    InvalidOptions(String),

    #[error("api key not set, export {0}")]
    MissingApiKey(String),

    #[error("note store error: {0:?}")]
    Store(#[from] anyhow::Error),
}
