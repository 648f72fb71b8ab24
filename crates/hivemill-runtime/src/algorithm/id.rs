//! Algorithm identifier type.

use derive_more::{Debug, Display, From, Into};
use serde::{Deserialize, Serialize};

/// Index of an algorithm in declaration order.
///
/// Assigned by the [`DependencyResolver`](crate::flow::DependencyResolver);
/// only meaningful for the [`DataFlow`](crate::flow::DataFlow) that produced it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Debug, Display, From, Into)]
#[debug("#{_0}")]
#[display("#{_0}")]
#[serde(transparent)]
pub struct AlgorithmId(usize);

impl AlgorithmId {
    /// Creates an id from a declaration index.
    #[inline]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the declaration index.
    #[inline]
    pub const fn index(&self) -> usize {
        self.0
    }
}
