//! Error types
//!
//! `ReportError` is what catalog lookups and report execution fail with;
//! `DatasetError` covers loading, validating and persisting datasets;
//! `ConfigError` covers configuration files.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error from a data store collaborator
pub type StoreFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the report catalog and executor
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("unknown query: {0}")]
    UnknownQuery(String),

    #[error("duplicate query id: {0}")]
    DuplicateQueryId(String),

    #[error("invalid parameter {}: {reason}", .names.join(", "))]
    InvalidParameter { names: Vec<String>, reason: String },

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("data store error: {source}")]
    DataStore {
        #[source]
        source: StoreFailure,
    },
}

impl ReportError {
    /// Wrap a failure reported by the data store
    pub fn data_store(source: impl Into<StoreFailure>) -> Self {
        ReportError::DataStore {
            source: source.into(),
        }
    }

    /// Stable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ReportError::UnknownQuery(_) => "UnknownQuery",
            ReportError::DuplicateQueryId(_) => "DuplicateQueryId",
            ReportError::InvalidParameter { .. } => "InvalidParameter",
            ReportError::SchemaMismatch(_) => "SchemaMismatch",
            ReportError::DataStore { .. } => "DataStoreError",
        }
    }
}

/// Errors raised while loading, checking or persisting a dataset
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("binary decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

impl DatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DatasetError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while reading or writing configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}
