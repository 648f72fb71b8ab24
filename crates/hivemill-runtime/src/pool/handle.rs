//! Checked-out algorithm instance.

use std::fmt;
use std::sync::Arc;

use crate::algorithm::{Algorithm, AlgorithmError, AlgorithmId};
use crate::event::EventContext;
use crate::store::EventStore;

/// An algorithm instance checked out of the pool.
///
/// Must be returned with [`AlgorithmPool::release`](super::AlgorithmPool::release)
/// once execution finished.
pub struct AlgorithmHandle {
    pub(super) id: AlgorithmId,
    pub(super) instance: Arc<dyn Algorithm>,
}

impl AlgorithmHandle {
    /// Returns the algorithm id.
    #[inline]
    pub fn id(&self) -> AlgorithmId {
        self.id
    }

    /// Runs the instance for one event.
    pub fn execute(&self, ctx: &EventContext, store: &EventStore) -> Result<(), AlgorithmError> {
        self.instance.execute(ctx, store)
    }
}

impl fmt::Debug for AlgorithmHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
