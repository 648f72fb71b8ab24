//! Data object identifier type.

use std::borrow::Borrow;

use derive_more::{Debug, Display, From, Into};
use serde::{Deserialize, Serialize};

/// Identifier of a data object stored in an event's whiteboard slot.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Debug, Display, From, Into)]
#[debug("{_0}")]
#[display("{_0}")]
#[serde(transparent)]
pub struct DataKey(String);

impl DataKey {
    /// Creates a key from a path-like identifier, e.g. `"/Event/Tracks"`.
    #[inline]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DataKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl AsRef<str> for DataKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DataKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
