//! Error types for noteproj.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for noteproj operations.
///
/// Errors only surface at the file-store and metadata-index boundaries.
/// Inside the resolution pipeline every failure degrades to a "no result"
/// outcome so one unreadable file cannot halt bulk processing.
#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid frontmatter in {path}: {message}")]
    InvalidFrontmatter { path: PathBuf, message: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for noteproj operations.
pub type Result<T> = std::result::Result<T, ProjectError>;
