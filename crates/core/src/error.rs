use std::path::PathBuf;

use crate::model::RecordId;

/// Malformed input hierarchy. Building fails fast; no partial tree is produced.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum HierarchyError {
    #[error("duplicate record id {0}")]
    DuplicateId(RecordId),
    #[error("record {id} references unknown parent {parent}")]
    OrphanParent { id: RecordId, parent: RecordId },
    #[error("record {0} is part of a parent cycle")]
    Cycle(RecordId),
    #[error("more than one root record: {first} and {second}")]
    MultipleRoots { first: RecordId, second: RecordId },
    #[error("record {id} has a non-finite value {value}")]
    InvalidValue { id: RecordId, value: f64 },
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScaleError {
    #[error("degenerate domain [{0}, {0}]")]
    DegenerateDomain(f64),
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON records: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid CSV records: {0}")]
    Csv(#[from] csv::Error),
    #[error("unsupported record file {0} (expected .json or .csv)")]
    UnknownFormat(PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
