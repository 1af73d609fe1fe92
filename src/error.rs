// src/error.rs

//! Error taxonomy for the dotweave core.
//!
//! One variant per error kind named in the specification; every core
//! component returns `Result<T>` built on this enum rather than `anyhow`,
//! so callers (the CLI, a future daemon, diagnostics) can match on kind.

use crate::operation::OperationID;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("package not found: {name}")]
    PackageNotFound { name: String },

    #[error("conflict at {path}: {reason}")]
    Conflict { path: PathBuf, reason: String },

    #[error("cyclic dependency among operations: {}", .cycle.iter().map(|o| o.as_str()).collect::<Vec<_>>().join(" -> "))]
    CyclicDependency { cycle: Vec<OperationID> },

    #[error("permission denied for {operation} on {path}")]
    PermissionDenied { path: PathBuf, operation: String },

    #[error("filesystem operation '{operation}' failed on {path}: {cause}")]
    FilesystemOperation {
        operation: String,
        path: PathBuf,
        cause: String,
    },

    #[error("source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("parent directory not found: {}", .0.display())]
    ParentNotFound(PathBuf),

    #[error("plan contains no operations")]
    EmptyPlan,

    #[error(
        "execution failed: {} executed, {} failed, {} rolled back: {cause}",
        executed.len(), failed.len(), rolled_back.len()
    )]
    ExecutionFailed {
        executed: Vec<OperationID>,
        failed: Vec<OperationID>,
        rolled_back: Vec<OperationID>,
        cause: String,
    },

    #[error("checkpoint not found: {id}")]
    CheckpointNotFound { id: String },

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("{} errors occurred", .0.len())]
    Multiple(Vec<Error>),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
