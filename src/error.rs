// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TubError {
    #[error("Tub at {path:?} has no metadata and no schema was given")]
    SchemaMissing { path: PathBuf },

    #[error("Tub metadata {path:?} is unreadable: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Field '{field}' is not declared in the schema")]
    UnknownField { field: String },

    #[error("Field '{field}' has unknown type '{type_name}'")]
    UnknownType { field: String, type_name: String },

    #[error("Field '{field}' is declared as '{expected}' but got a {actual} value")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: &'static str,
    },

    #[error("Record {ix} not found")]
    RecordNotFound { ix: usize },

    #[error("Record {ix} is corrupt: {reason}")]
    CorruptRecord { ix: usize, reason: String },

    #[error("{path:?} is not a tub (no metadata)")]
    NotATub { path: PathBuf },

    #[error("Tub root {path:?} is not a directory")]
    RootMissing { path: PathBuf },

    #[error("Image codec error: {0}")]
    Image(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TubError>;
