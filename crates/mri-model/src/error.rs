//! Error taxonomy for visit scanning.
//!
//! Every failure mode the engine can surface is classified here. The
//! propagation rules are:
//!
//! - [`MriError::MissingRequiredField`] and [`MriError::UnreadableHeader`]
//!   abort a single file or dataset and are caught by the directory walk,
//!   which logs and skips that candidate.
//! - [`MriError::NotFound`] at visit construction and
//!   [`MriError::NoValidAggregate`] at scan finalization are fatal and
//!   propagate to the caller.
//! - Optional-field misses are never errors; they become warnings on the
//!   affected [`RawImageFile`](crate::RawImageFile).

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Classified errors produced while scanning raw visit directories.
#[derive(Debug, Error)]
pub enum MriError {
    /// A visit directory or referenced raw file does not exist.
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Every reader in the header cascade failed to produce acceptable
    /// output for the file.
    #[error("header not readable for file {filename}")]
    UnreadableHeader { filename: String },

    /// A required metadata field could not be extracted from the header.
    #[error("required header field missing: {field}")]
    MissingRequiredField { field: &'static str },

    /// A dataset was assembled from files that do not form a valid
    /// acquisition (empty collection, or underivable metadata).
    #[error("invalid dataset composition: {0}")]
    InvalidComposition(String),

    /// Visit-level reconciliation found no dataset with a usable value.
    #[error("no valid aggregate: {0}")]
    NoValidAggregate(String),

    /// Filesystem I/O failure, with the offending path.
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external decompressor exited unsuccessfully.
    #[error("decompressor failed with {status} on {}", path.display())]
    Decompress { path: PathBuf, status: ExitStatus },
}

impl MriError {
    /// Convenience constructor wrapping an I/O error with its path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MriError>;
