//! Store error types.

use crate::flow::DataKey;

/// Errors raised by [`EventStore`](super::EventStore) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A data object was registered twice for the same event.
    #[error("data object '{0}' is already registered")]
    AlreadyRegistered(DataKey),

    /// A data object was requested that does not exist.
    #[error("data object '{0}' is not available")]
    NotFound(DataKey),

    /// A data object exists but holds a different type.
    #[error("data object '{0}' has an unexpected type")]
    TypeMismatch(DataKey),
}
