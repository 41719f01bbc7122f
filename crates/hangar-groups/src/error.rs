use hangar_storage::StoreError;
use thiserror::Error;

use crate::directory::DirectoryError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("{0} has expired")]
    Expired(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("character directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("storage error: {0}")]
    Store(StoreError),
}

impl EngineError {
    pub(crate) fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub(crate) fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => EngineError::NotFound("record"),
            StoreError::AlreadyExists => EngineError::Conflict("record already exists".into()),
            StoreError::Conflict => EngineError::Conflict("concurrent modification".into()),
            other => EngineError::Store(other),
        }
    }
}

/// Map a store lookup, naming the missing entity on `NotFound`.
pub(crate) fn missing(what: &'static str) -> impl Fn(StoreError) -> EngineError {
    move |e| match e {
        StoreError::NotFound => EngineError::NotFound(what),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_engine_errors() {
        assert!(matches!(
            EngineError::from(StoreError::AlreadyExists),
            EngineError::Conflict(_)
        ));
        assert!(matches!(
            EngineError::from(StoreError::Backend("disk full".into())),
            EngineError::Store(StoreError::Backend(_))
        ));
        assert_eq!(
            missing("group")(StoreError::NotFound).to_string(),
            "group not found"
        );
    }
}
