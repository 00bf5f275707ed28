//! Error taxonomy for the knowledge core.
//!
//! Only two things can go wrong: the caller handed us something unusable
//! ([`KnowledgeError::Validation`]), or the backing store failed
//! ([`KnowledgeError::StorageUnavailable`]). An empty retrieval is a valid
//! result, not an error.

use thiserror::Error;

/// Boxed source error carried by [`KnowledgeError::StorageUnavailable`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// Rejected before any storage access.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The store could not be reached or a read/write failed.
    #[error("knowledge store unavailable: {0}")]
    StorageUnavailable(#[source] BoxError),
}

impl KnowledgeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Wrap any backend error as [`KnowledgeError::StorageUnavailable`].
    ///
    /// Intended for `.map_err(KnowledgeError::storage)` at store boundaries.
    pub fn storage<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::StorageUnavailable(err.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, KnowledgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_keeps_source_message() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "db down");
        let err = KnowledgeError::storage(io);
        assert!(!err.is_validation());
        assert!(err.to_string().contains("db down"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_validation_display() {
        let err = KnowledgeError::validation("clientId is required");
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "validation failed: clientId is required");
    }
}
