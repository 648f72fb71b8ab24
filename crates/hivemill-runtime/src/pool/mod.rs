//! Algorithm resource pool.
//!
//! Hands out algorithm instances to slot schedulers while enforcing the
//! declared [`Concurrency`](crate::algorithm::Concurrency) of each algorithm
//! and the exclusivity of named resources.

mod algorithm_pool;
mod handle;
mod stats;

pub use algorithm_pool::AlgorithmPool;
pub use handle::AlgorithmHandle;
pub use stats::{AlgorithmStats, PoolStats};
