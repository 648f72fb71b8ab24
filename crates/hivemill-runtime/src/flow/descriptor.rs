//! Resolved algorithm metadata.

use super::{DataKey, DataMask};
use crate::algorithm::{AlgorithmFactory, AlgorithmId, Concurrency};

/// Static description of one algorithm, computed once at resolution.
///
/// `outputs` includes keys attributed to the data loader. The masks never
/// change after resolution.
#[derive(Debug, Clone)]
pub struct AlgorithmDescriptor {
    pub(crate) id: AlgorithmId,
    pub(crate) name: String,
    pub(crate) inputs: Vec<DataKey>,
    pub(crate) outputs: Vec<DataKey>,
    pub(crate) concurrency: Concurrency,
    pub(crate) resources: Vec<String>,
    pub(crate) factory: AlgorithmFactory,
    pub(crate) dependency_mask: DataMask,
    pub(crate) output_mask: DataMask,
}

impl AlgorithmDescriptor {
    /// Returns the algorithm id.
    #[inline]
    pub fn id(&self) -> AlgorithmId {
        self.id
    }

    /// Returns the algorithm name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared inputs.
    pub fn inputs(&self) -> &[DataKey] {
        &self.inputs
    }

    /// Returns the outputs, including keys attributed by the data loader.
    pub fn outputs(&self) -> &[DataKey] {
        &self.outputs
    }

    /// Returns the instance sharing policy.
    pub fn concurrency(&self) -> Concurrency {
        self.concurrency
    }

    /// Returns the exclusive resources the algorithm needs.
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// Returns the instance factory.
    pub fn factory(&self) -> &AlgorithmFactory {
        &self.factory
    }

    /// Bits of all keys that must be produced before the algorithm may run.
    pub fn dependency_mask(&self) -> &DataMask {
        &self.dependency_mask
    }

    /// Bits of all keys the algorithm produces.
    pub fn output_mask(&self) -> &DataMask {
        &self.output_mask
    }

    /// Returns `true` if every input is already produced.
    #[inline]
    pub fn is_ready(&self, produced: &DataMask) -> bool {
        self.dependency_mask.is_subset(produced)
    }
}
