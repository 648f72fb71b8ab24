//! Data-flow model: data object keys, bit masks and dependency resolution.
//!
//! - [`DataKey`]: identifier of a data object in an event store
//! - [`DataMask`]: dynamically sized bit set over key or algorithm indices
//! - [`DependencyResolver`]: turns declared inputs/outputs into a [`DataFlow`]

mod descriptor;
mod key;
mod mask;
mod resolver;

pub use descriptor::AlgorithmDescriptor;
pub use key::DataKey;
pub use mask::DataMask;
pub use resolver::{DataFlow, DependencyResolver, KeyIndex};
