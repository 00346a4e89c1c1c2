use std::io;
use std::path::PathBuf;

use thiserror::Error;
use writebench_storage::BackendError;

/// Invalid benchmark configuration, detected before any upload runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The destination could not be mapped to a storage backend.
    #[error("invalid destination `{destination}`: {reason}")]
    InvalidDestination {
        destination: String,
        reason: &'static str,
    },

    /// A synthetic payload must contain at least one byte.
    #[error("payload size must be greater than zero")]
    EmptyPayload,

    /// The local source file cannot be read.
    #[error("local file `{}` not found", path.display())]
    SourceFile {
        path: PathBuf,
        #[source]
        cause: io::Error,
    },

    /// The configuration file or environment could not be loaded.
    #[error("failed to load configuration")]
    Load(#[from] Box<figment::Error>),
}

/// Errors raised while running a benchmark.
///
/// Everything except [`Error::Delete`] is fatal and aborts the benchmark.
#[derive(Debug, Error)]
pub enum Error {
    /// The benchmark was misconfigured.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The storage client could not be created.
    #[error("failed to connect to storage")]
    Connect(#[source] BackendError),

    /// Writing an object failed.
    #[error("failed to upload `{destination}`")]
    Upload {
        destination: String,
        #[source]
        cause: BackendError,
    },

    /// The remote object does not have the size that was uploaded.
    #[error(
        "size mismatch for `{destination}`: uploaded {expected} bytes, remote reports {actual} bytes"
    )]
    SizeMismatch {
        destination: String,
        expected: u64,
        actual: u64,
    },

    /// Cleaning up an object after a run failed.
    #[error("failed to delete `{destination}`")]
    Delete {
        destination: String,
        #[source]
        cause: BackendError,
    },

    /// Writing the report failed.
    #[error("failed to write report")]
    Output(#[from] io::Error),
}

impl Error {
    /// Returns `true` if the error aborts the benchmark.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Delete { .. })
    }
}

/// Result type for benchmark operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
