//! Algorithm registration.

use std::fmt;
use std::sync::Arc;

use derive_builder::Builder;

use super::{Algorithm, Concurrency};
use crate::flow::DataKey;

/// Creates algorithm instances on demand.
///
/// Singletons and re-entrant algorithms call it once; clonable algorithms
/// call it lazily for every clone up to their cardinality.
#[derive(Clone)]
pub struct AlgorithmFactory(Arc<dyn Fn() -> Arc<dyn Algorithm> + Send + Sync>);

impl AlgorithmFactory {
    /// Wraps a constructor closure.
    pub fn new<A, F>(f: F) -> Self
    where
        A: Algorithm + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        Self(Arc::new(move || Arc::new(f()) as Arc<dyn Algorithm>))
    }

    /// Always hands out the same shared instance.
    pub fn shared(instance: Arc<dyn Algorithm>) -> Self {
        Self(Arc::new(move || Arc::clone(&instance)))
    }

    /// Creates a new instance.
    pub fn create(&self) -> Arc<dyn Algorithm> {
        (self.0)()
    }
}

impl fmt::Debug for AlgorithmFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmFactory").finish_non_exhaustive()
    }
}

/// Declaration of an algorithm and its data dependencies.
#[derive(Debug, Clone, Builder)]
#[builder(
    name = "AlgorithmSpecBuilder",
    pattern = "owned",
    setter(into, prefix = "with"),
    build_fn(validate = "Self::validate")
)]
pub struct AlgorithmSpec {
    /// Unique algorithm name.
    pub name: String,
    /// Data objects read by the algorithm, in declaration order.
    #[builder(default, setter(each(name = "with_input", into)))]
    pub inputs: Vec<DataKey>,
    /// Data objects written by the algorithm, in declaration order.
    #[builder(default, setter(each(name = "with_output", into)))]
    pub outputs: Vec<DataKey>,
    /// Instance sharing policy.
    #[builder(default)]
    pub concurrency: Concurrency,
    /// Exclusive resources held while the algorithm executes.
    #[builder(default, setter(each(name = "with_resource", into)))]
    pub resources: Vec<String>,
    /// Instance factory.
    #[builder(setter(custom))]
    pub factory: AlgorithmFactory,
}

impl AlgorithmSpec {
    /// Returns a builder for an algorithm with the given name.
    pub fn builder(name: impl Into<String>) -> AlgorithmSpecBuilder {
        AlgorithmSpecBuilder::default().with_name(name)
    }
}

impl AlgorithmSpecBuilder {
    /// Sets the constructor used to create instances.
    pub fn with_factory<A, F>(mut self, f: F) -> Self
    where
        A: Algorithm + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        self.factory = Some(AlgorithmFactory::new(f));
        self
    }

    /// Sets a prebuilt instance factory.
    pub fn with_algorithm_factory(mut self, factory: AlgorithmFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err("Algorithm name must not be empty".to_string());
        }

        if let Some(Concurrency::Clonable { cardinality: 0 }) = &self.concurrency {
            return Err("Clonable algorithm cardinality must be greater than 0".to_string());
        }

        if let Some(outputs) = &self.outputs {
            for (i, key) in outputs.iter().enumerate() {
                if outputs[..i].contains(key) {
                    return Err(format!("Output '{key}' is declared twice"));
                }
            }
        }

        Ok(())
    }
}
