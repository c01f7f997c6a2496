use thiserror::Error;

/// A namespace, resource or blob path name was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid name {name:?}: {reason}")]
pub struct NameError {
    pub name: String,
    pub reason: String,
}

impl NameError {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias for name validation.
pub type NameResult<T> = Result<T, NameError>;
