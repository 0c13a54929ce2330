use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse scenario JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Failed to build internal domain model: {0}")]
    ModelConstructionError(String),

    /// The pod specification can never be satisfied as written.
    #[error("Invalid pod instance requirement: {0}")]
    InvalidRequirement(String),

    #[error("State store read failed: {0}")]
    StateStore(String),
}

pub type Result<T> = std::result::Result<T, Error>;
