use strata_types::NameError;

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// The requested blob does not exist.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// The path cannot be mapped onto the backend.
    #[error("invalid blob path: {0}")]
    InvalidPath(#[from] NameError),

    /// I/O error from the underlying storage backend.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Any other backend failure (transport, permissions, injected faults).
    #[error("backend error: {0}")]
    Backend(String),
}

impl BlobError {
    /// Returns `true` if this is a [`BlobError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub(crate) fn io(path: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_string())
        } else {
            Self::Io {
                path: path.to_string(),
                source,
            }
        }
    }
}

/// Result alias for blob store operations.
pub type BlobResult<T> = Result<T, BlobError>;
