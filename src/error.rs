use std::io;

use thiserror::Error;

use crate::content::Track;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Cache write failed: {0}")]
    CacheWrite(String),

    #[error("Index not built for track: {0}")]
    IndexNotBuilt(Track),

    #[error("Section {section_id} already indexed under track {existing}, refusing to add it to {incoming}")]
    DuplicateSection {
        section_id: String,
        existing: Track,
        incoming: Track,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Missing required config: {0}")]
    MissingConfig(String),

    #[error("Content parse error: {0}")]
    ContentParse(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl LinkError {
    /// Whether the error means the semantic signal is missing for this call
    /// rather than something the caller has to fix.
    #[must_use]
    pub const fn is_degradation(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingUnavailable(_) | Self::CacheWrite(_) | Self::IndexNotBuilt(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
