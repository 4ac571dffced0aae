//! Errors of the channel stores.

use std::path::PathBuf;

use bitcoin::OutPoint;
use thiserror::Error;

/// Errors that can occur while opening or reading a channel store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// The file that was opened.
        path: PathBuf,

        /// The underlying error.
        source: std::io::Error,
    },

    /// The store file is not a valid channel dump.
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// The file that was parsed.
        path: PathBuf,

        /// The underlying error.
        source: serde_json::Error,
    },

    /// Two records share one funding outpoint.
    #[error("duplicate channel {0}")]
    DuplicateChannel(OutPoint),
}

/// Wrapper type for results that can fail with a [`StoreError`].
pub type DbResult<T> = Result<T, StoreError>;
