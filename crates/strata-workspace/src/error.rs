use strata_blob::BlobError;
use strata_types::{Checkpoint, NameError};

/// Boxed root cause carried by [`StorageError::InvalidStorage`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from the checkpoint and resource layers.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A blob store operation or a snapshot codec failed.
    #[error("invalid storage at {path}: {source}")]
    InvalidStorage {
        path: String,
        #[source]
        source: BoxError,
    },

    /// The lifecycle contract was violated by the caller.
    #[error("invalid usage: {0}")]
    InvalidUsage(String),

    /// Every checkpoint was tried and none could be loaded.
    #[error("no loadable checkpoint under {root:?} (failed: {failed:?})")]
    RecoveryExhausted {
        root: String,
        failed: Vec<Checkpoint>,
        #[source]
        last: Box<StorageError>,
    },

    /// A load was abandoned before it completed (timeout or caller request).
    #[error("load cancelled: {reason}")]
    Cancelled { reason: String },

    /// Configuration could not be read or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Create an [`StorageError::InvalidStorage`] for `path`.
    pub fn storage(path: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::InvalidStorage {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Create an [`StorageError::InvalidUsage`].
    pub fn usage(message: impl Into<String>) -> Self {
        Self::InvalidUsage(message.into())
    }

    /// Wrap a blob store failure at `path`.
    pub fn blob(path: impl Into<String>, source: BlobError) -> Self {
        Self::storage(path, source)
    }

    /// `true` if rolling back to an older checkpoint may cure this error.
    ///
    /// Usage and configuration errors are deterministic and would fail the
    /// same way against every checkpoint.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InvalidStorage { .. } | Self::Cancelled { .. })
    }
}

impl From<NameError> for StorageError {
    fn from(err: NameError) -> Self {
        Self::InvalidUsage(err.to_string())
    }
}

/// Result alias for checkpoint and resource operations.
pub type StorageResult<T> = Result<T, StorageError>;
