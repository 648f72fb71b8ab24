//! Algorithm error type.

use std::borrow::Cow;

use crate::store::StoreError;

/// Failure reported by an algorithm.
///
/// During event processing this marks the event as failed; from a lifecycle
/// hook it aborts the corresponding event loop transition.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct AlgorithmError {
    message: Cow<'static, str>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AlgorithmError {
    /// Creates an error with a message.
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error with a message and source.
    pub fn with_source(
        message: impl Into<Cow<'static, str>>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<StoreError> for AlgorithmError {
    fn from(error: StoreError) -> Self {
        Self::with_source("data store access failed", error)
    }
}
