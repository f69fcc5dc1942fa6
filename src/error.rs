// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdaptError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON processing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Indexer: `{0}` was not found!")]
    BinaryNotFound(PathBuf),

    #[error("{tool} exited with {status}")]
    Command { tool: String, status: std::process::ExitStatus },

    #[error(
        "IsoFile: Index file corrupted! {} ({})",
        if *removed { "It was deleted, index again." } else { "Delete it and retry." },
        path.display()
    )]
    CorruptedIndex { path: PathBuf, removed: bool },

    #[error("IsoFile: Index file corrupted, tried to delete it and failed. Please retry. ({})", path.display())]
    CorruptedIndexDeleteFailed { path: PathBuf },

    #[error("Malformed index file: {0}")]
    MalformedIndex(String),

    #[error("{func}: not a valid frame ({reason})")]
    InvalidFrame { func: String, reason: String },

    #[error("{func}: Input clip must be of {allowed} color family, not {found}!")]
    InvalidColorFamily { func: String, found: String, allowed: String },

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("You need to specify a default/fallback value!")]
    MissingFallback,

    #[error("Input error: {0}")]
    Input(String),
}

impl AdaptError {
    /// True when the index was corrupted and has already been removed,
    /// so indexing again is expected to succeed.
    pub fn is_retriable_corruption(&self) -> bool {
        matches!(self, AdaptError::CorruptedIndex { removed: true, .. })
    }
}

// Define a standard Result type for the crate
pub type Result<T> = std::result::Result<T, AdaptError>;
