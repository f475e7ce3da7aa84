use std::path::PathBuf;

use thiserror::Error;

use crate::model::Pipeline;

/// Failures while restoring or persisting a model blob.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("nnclass: io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("nnclass: compression: {0}")]
    Compression(String),

    #[error("nnclass: unknown format: {0}")]
    UnknownFormat(String),

    #[error("nnclass: model built for pipeline {stored}, requested {expected}")]
    Incompatible { stored: Pipeline, expected: Pipeline },
}

/// Errors returned by classifier operations.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("nnclass: model corrupt for subject {subject_id} (pipeline {pipeline}): {reason}")]
    ModelCorrupt {
        subject_id: i32,
        pipeline: Pipeline,
        reason: String,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("nnclass: result set is empty")]
    EmptyResultSet,

    #[error("nnclass: dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("nnclass: feature {index} is not a finite number: {value}")]
    NonFinite { index: usize, value: f64 },

    #[error("nnclass: minkowski order must be a positive finite number, got {0}")]
    InvalidOrder(f64),

    #[error("nnclass: unknown classifier kind {0:?}")]
    UnknownKind(String),
}
