//! Error types for etcdxtl
//!
//! Provides a unified error type for all operations. Variants split into two
//! classes: fatal errors that abort the invocation, and per-record errors
//! that are logged while the scan carries on (see [`DumpError::is_fatal`]).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using DumpError
pub type Result<T> = std::result::Result<T, DumpError>;

/// Unified error type for etcdxtl operations
#[derive(Debug, Error)]
pub enum DumpError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("failed to open bolt DB: {path}, {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("timed out after {timeout:?} waiting for the lock on {path}")]
    LockTimeout { path: PathBuf, timeout: Duration },

    #[error("got nil bucket for {bucket}, maybe the db {path} is invalid")]
    MissingBucket { bucket: String, path: PathBuf },

    #[error("corrupt page file: {0}")]
    Corrupt(String),

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("failed to decode value ({len} bytes): {reason}")]
    Decode { len: usize, reason: String },

    #[error("failed to encode object: {0}")]
    Encode(String),

    #[error("failed to decode and persist {key} with revision {revision}: {source}")]
    Record {
        key: String,
        revision: i64,
        #[source]
        source: Box<DumpError>,
    },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DumpError {
    /// Whether the error aborts the whole invocation.
    ///
    /// Record-level failures (a damaged entry, an undecodable payload, a
    /// strict-encoding rejection) are logged and skipped by the scanner.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            DumpError::MalformedRecord(_)
                | DumpError::Decode { .. }
                | DumpError::Encode(_)
                | DumpError::Record { .. }
        )
    }
}
