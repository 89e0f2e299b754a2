//! Local JSON persistence.
//!
//! This module provides:
//! - Atomic JSON documents (write to a sibling `.tmp`, then rename)
//! - A single-writer lock file for the process that owns the ledger

pub mod json;
pub mod lock;

pub use json::JsonStore;
pub use lock::WriterLock;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error on {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("writer lock {} is held by another process", .0.display())]
    Locked(PathBuf),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn serialize(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StoreError::Serialize {
            path: path.into(),
            source,
        }
    }
}
