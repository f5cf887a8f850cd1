//! Error types for export operations.
//!
//! This module provides the [`ExportError`] type for all export operations
//! and the [`Result`] convenience type.

use thiserror::Error;

/// Error type for all export operations.
///
/// Covers structural violations while building or serializing records,
/// configuration errors detected before a run starts, and failures of the
/// external data source.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Error indicating an invalid leader (24-byte header).
    #[error("Invalid leader: {0}")]
    InvalidLeader(String),

    /// Error indicating an invalid or malformed record.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Error indicating an invalid field structure.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// A serialized record overflows a fixed-width length or position slot.
    #[error("Record too large: {0}")]
    RecordTooLarge(String),

    /// A record number contains something other than ASCII digits.
    #[error("Invalid record number: '{0}'")]
    InvalidRecordNumber(String),

    /// The output destination is missing, not a directory, or not writable.
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    /// The external data source failed to execute a query.
    #[error("Data source error: {0}")]
    DataSource(String),

    /// IO error from the underlying destination.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for [`std::result::Result`] with [`ExportError`].
pub type Result<T> = std::result::Result<T, ExportError>;
