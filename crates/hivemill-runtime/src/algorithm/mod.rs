//! Algorithm abstraction.
//!
//! An [`Algorithm`] is a unit of per-event work. It is registered through an
//! [`AlgorithmSpec`] that declares the data objects it reads and writes, how
//! many instances may run concurrently ([`Concurrency`]) and a factory used by
//! the [`AlgorithmPool`](crate::pool::AlgorithmPool) to create instances.

mod error;
mod id;
mod spec;

pub use error::AlgorithmError;
pub use id::AlgorithmId;
pub use spec::{AlgorithmFactory, AlgorithmSpec, AlgorithmSpecBuilder, AlgorithmSpecBuilderError};
use serde::{Deserialize, Serialize};

use crate::event::EventContext;
use crate::store::EventStore;

/// A unit of per-event computation.
///
/// `execute` runs on a worker thread and must only touch the store it is
/// handed. The lifecycle hooks are invoked once per instance by the pool; they
/// default to no-ops.
pub trait Algorithm: Send + Sync {
    /// Called once after the instance is created.
    fn initialize(&self) -> Result<(), AlgorithmError> {
        Ok(())
    }

    /// Called when the event loop starts, or right after initialization for
    /// clones created while the loop is running.
    fn start(&self) -> Result<(), AlgorithmError> {
        Ok(())
    }

    /// Processes one event.
    fn execute(&self, ctx: &EventContext, store: &EventStore) -> Result<(), AlgorithmError>;

    /// Called when the event loop stops.
    fn stop(&self) -> Result<(), AlgorithmError> {
        Ok(())
    }

    /// Called once before the instance is dropped.
    fn finalize(&self) -> Result<(), AlgorithmError> {
        Ok(())
    }
}

/// How instances of an algorithm may be shared between concurrent events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(strum::Display)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Concurrency {
    /// Exactly one instance, used by one event at a time.
    #[default]
    Singleton,
    /// Up to `cardinality` instances, created lazily.
    Clonable {
        /// Maximum number of instances.
        cardinality: usize,
    },
    /// One shared instance that may run for any number of events at once.
    Reentrant,
}

impl Concurrency {
    /// Maximum number of instances the pool may create.
    pub fn max_instances(&self) -> usize {
        match self {
            Self::Singleton | Self::Reentrant => 1,
            Self::Clonable { cardinality } => *cardinality,
        }
    }

    /// Returns `true` if acquiring an instance does not consume it.
    pub fn is_reentrant(&self) -> bool {
        matches!(self, Self::Reentrant)
    }
}

/// Lifecycle phases driven on every algorithm instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum LifecyclePhase {
    /// Instance initialization.
    Initialize,
    /// Start of the event loop.
    Start,
    /// End of the event loop.
    Stop,
    /// Instance finalization.
    Finalize,
}

impl LifecyclePhase {
    pub(crate) fn invoke(self, algorithm: &dyn Algorithm) -> Result<(), AlgorithmError> {
        match self {
            Self::Initialize => algorithm.initialize(),
            Self::Start => algorithm.start(),
            Self::Stop => algorithm.stop(),
            Self::Finalize => algorithm.finalize(),
        }
    }
}
