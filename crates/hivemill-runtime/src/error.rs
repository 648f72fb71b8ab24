//! Runtime error types.

use crate::algorithm::{AlgorithmError, AlgorithmId, LifecyclePhase};
use crate::event::SelectorError;
use crate::flow::DataKey;
use crate::supervisor::LoopState;

/// Result type alias for runtime operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while configuring or driving the event loop.
///
/// Failures of individual events are not errors: they are reported through
/// [`EventStatus`](crate::scheduler::EventStatus) and aggregated in the run
/// summary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An algorithm requires a data object that nothing produces.
    #[error("data object '{key}' required by algorithm '{algorithm}' is not produced by any algorithm")]
    DanglingDependency {
        /// The missing data object.
        key: DataKey,
        /// The algorithm requesting it.
        algorithm: String,
    },

    /// Two algorithms declare the same output.
    #[error("data object '{key}' is produced by both '{first}' and '{second}'")]
    DuplicateProducer {
        /// The contested data object.
        key: DataKey,
        /// The algorithm that declared it first.
        first: String,
        /// The algorithm that declared it again.
        second: String,
    },

    /// The same algorithm name is registered twice.
    #[error("algorithm '{0}' is registered more than once")]
    DuplicateAlgorithm(String),

    /// A configured termination output is not produced by any algorithm.
    #[error("required output '{0}' is not produced by any algorithm")]
    UnproducedOutput(DataKey),

    /// The data-flow graph contains a cycle and cycles are rejected.
    #[error("cyclic data dependency between algorithms: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),

    /// The configured data loader is not a registered algorithm.
    #[error("data loader algorithm '{0}' is not registered")]
    UnknownDataLoader(String),

    /// An algorithm id outside the resolved set was used.
    #[error("unknown algorithm {0}")]
    UnknownAlgorithm(AlgorithmId),

    /// A slot index outside the whiteboard was used.
    #[error("slot {slot} is out of range (whiteboard has {slots} slots)")]
    InvalidSlot {
        /// The requested slot.
        slot: usize,
        /// Number of slots in the whiteboard.
        slots: usize,
    },

    /// An algorithm lifecycle hook failed.
    #[error("algorithm '{algorithm}' failed to {phase}: {source}")]
    Lifecycle {
        /// Name of the algorithm.
        algorithm: String,
        /// The lifecycle phase that failed.
        phase: LifecyclePhase,
        /// The error reported by the algorithm.
        #[source]
        source: AlgorithmError,
    },

    /// An event loop operation was called in the wrong lifecycle state.
    #[error("event loop is {actual}, expected {expected}")]
    InvalidState {
        /// The state the operation requires.
        expected: LoopState,
        /// The state the event loop is in.
        actual: LoopState,
    },

    /// The event selector failed.
    #[error(transparent)]
    Selector(#[from] SelectorError),

    /// Configuration values are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}
