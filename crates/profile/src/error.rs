use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors loading a profile file. All of these are recoverable at module
/// granularity: the caller reports a diagnostic and leaves the module
/// unannotated.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read profile `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed profile `{path}`: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("unsupported profile version {found} in `{path}` (expected {expected})")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("`{path}` does not contain a memory profile section")]
    NoMemorySection { path: PathBuf },
}

/// Per-function lookup failures. Recoverable: the function is left
/// unannotated and the failure is tallied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecordLookupError {
    #[error("no memory profile record for function")]
    UnknownFunction,

    #[error("memory profile function hash mismatch")]
    HashMismatch,
}
