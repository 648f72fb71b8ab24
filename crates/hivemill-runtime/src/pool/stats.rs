//! Pool statistics.

use serde::Serialize;

/// Usage counters of one algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlgorithmStats {
    /// Algorithm name.
    pub name: String,
    /// Instances created so far.
    pub instances: usize,
    /// Instances currently checked out.
    pub busy: usize,
    /// Successful acquisitions.
    pub acquired: u64,
    /// Acquisitions refused because no instance or resource was free.
    pub misses: u64,
}

/// Snapshot of the pool counters, in algorithm declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Per-algorithm counters.
    pub algorithms: Vec<AlgorithmStats>,
}

impl PoolStats {
    /// Total number of refused acquisitions.
    pub fn total_misses(&self) -> u64 {
        self.algorithms.iter().map(|stats| stats.misses).sum()
    }

    /// Returns the counters of an algorithm.
    pub fn get(&self, name: &str) -> Option<&AlgorithmStats> {
        self.algorithms.iter().find(|stats| stats.name == name)
    }
}
