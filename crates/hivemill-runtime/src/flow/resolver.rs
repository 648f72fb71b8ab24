//! Dependency resolution.
//!
//! Turns the declared inputs and outputs of every [`AlgorithmSpec`] into
//! per-algorithm dependency masks and the global termination requirement.

use std::collections::HashMap;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

use super::{AlgorithmDescriptor, DataKey, DataMask};
use crate::algorithm::{AlgorithmId, AlgorithmSpec};
use crate::error::{Error, Result};

/// Tracing target for dependency resolution.
const TRACING_TARGET: &str = "hivemill_runtime::flow";

/// Append-only map from data keys to bit indices.
///
/// Indices are assigned in first-seen order, so walking the algorithms in
/// declaration order yields the same assignment on every run.
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    keys: Vec<DataKey>,
    index: HashMap<DataKey, usize>,
}

impl KeyIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `key`, assigning the next free one if unseen.
    pub fn insert(&mut self, key: &DataKey) -> usize {
        if let Some(index) = self.index.get(key) {
            return *index;
        }
        let index = self.keys.len();
        self.keys.push(key.clone());
        self.index.insert(key.clone(), index);
        index
    }

    /// Returns the index of a key.
    pub fn get(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Returns the key at an index.
    pub fn key(&self, index: usize) -> Option<&DataKey> {
        self.keys.get(index)
    }

    /// Returns all keys in index order.
    pub fn keys(&self) -> &[DataKey] {
        &self.keys
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no key was registered.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Builds a mask with the bits of the given keys. Unknown keys are skipped.
    pub fn mask<'a>(&self, keys: impl IntoIterator<Item = &'a DataKey>) -> DataMask {
        DataMask::from_bits(
            self.len(),
            keys.into_iter().filter_map(|key| self.get(key.as_str())),
        )
    }
}

/// Assigns an index to every declared key: per algorithm in declaration
/// order, inputs first, then outputs.
pub fn build_index(specs: &[AlgorithmSpec]) -> KeyIndex {
    let mut index = KeyIndex::new();
    for spec in specs {
        for key in spec.inputs.iter().chain(&spec.outputs) {
            index.insert(key);
        }
    }
    index
}

/// ORs together the bits of every input key. No inputs yields an empty mask.
pub fn compute_dependency_mask(inputs: &[DataKey], index: &KeyIndex) -> DataMask {
    index.mask(inputs)
}

/// Collects every output no other algorithm consumes, plus the explicitly
/// required outputs.
pub fn compute_termination_requirement(
    algorithms: &[AlgorithmDescriptor],
    index: &KeyIndex,
    required: &[DataKey],
) -> DataMask {
    let mut termination = index.mask(required);
    for algorithm in algorithms {
        for key in &algorithm.outputs {
            let consumed = algorithms
                .iter()
                .any(|other| other.id != algorithm.id && other.inputs.contains(key));
            if !consumed && let Some(bit) = index.get(key.as_str()) {
                termination.insert(bit);
            }
        }
    }
    termination
}

/// Validates declared algorithms and computes their static data flow.
#[derive(Debug, Clone)]
pub struct DependencyResolver {
    specs: Vec<AlgorithmSpec>,
    data_loader: Option<String>,
    required_outputs: Vec<DataKey>,
    reject_cycles: bool,
}

impl DependencyResolver {
    /// Creates a resolver over algorithms in declaration order.
    pub fn new(specs: Vec<AlgorithmSpec>) -> Self {
        Self {
            specs,
            data_loader: None,
            required_outputs: Vec::new(),
            reject_cycles: false,
        }
    }

    /// Attributes unmet inputs to the named algorithm instead of failing.
    pub fn with_data_loader(mut self, name: impl Into<String>) -> Self {
        self.data_loader = Some(name.into());
        self
    }

    /// Adds outputs that must exist before an event is complete.
    pub fn with_required_outputs<K>(mut self, keys: impl IntoIterator<Item = K>) -> Self
    where
        K: Into<DataKey>,
    {
        self.required_outputs.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Makes dependency cycles a configuration error.
    pub fn with_reject_cycles(mut self, reject: bool) -> Self {
        self.reject_cycles = reject;
        self
    }

    /// Resolves the declared algorithms into a [`DataFlow`].
    pub fn resolve(self) -> Result<DataFlow> {
        let Self {
            mut specs,
            data_loader,
            required_outputs,
            reject_cycles,
        } = self;

        let mut names: HashMap<&str, usize> = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            if names.insert(spec.name.as_str(), i).is_some() {
                return Err(Error::DuplicateAlgorithm(spec.name.clone()));
            }
        }

        let loader = match &data_loader {
            Some(name) => match names.get(name.as_str()) {
                Some(i) => Some(*i),
                None => return Err(Error::UnknownDataLoader(name.clone())),
            },
            None => None,
        };
        drop(names);

        let mut producers: HashMap<DataKey, usize> = HashMap::new();
        for (i, spec) in specs.iter().enumerate() {
            for key in &spec.outputs {
                if let Some(first) = producers.insert(key.clone(), i) {
                    return Err(Error::DuplicateProducer {
                        key: key.clone(),
                        first: specs[first].name.clone(),
                        second: spec.name.clone(),
                    });
                }
            }
        }

        let mut attributed = Vec::new();
        for (i, spec) in specs.iter().enumerate() {
            for key in &spec.inputs {
                if producers.contains_key(key) || attributed.contains(key) {
                    continue;
                }
                match loader {
                    Some(loader) if loader != i => attributed.push(key.clone()),
                    _ => {
                        return Err(Error::DanglingDependency {
                            key: key.clone(),
                            algorithm: spec.name.clone(),
                        });
                    }
                }
            }
        }

        if let Some(loader) = loader {
            let spec = &mut specs[loader];
            for key in attributed {
                tracing::info!(
                    target: TRACING_TARGET,
                    key = %key,
                    data_loader = %spec.name,
                    "Attributing unmet input to data loader"
                );
                producers.insert(key.clone(), loader);
                spec.outputs.push(key);
            }
        }

        for key in &required_outputs {
            if !producers.contains_key(key) {
                return Err(Error::UnproducedOutput(key.clone()));
            }
        }

        let index = build_index(&specs);

        let algorithms: Vec<AlgorithmDescriptor> = specs
            .into_iter()
            .enumerate()
            .map(|(i, spec)| AlgorithmDescriptor {
                id: AlgorithmId::new(i),
                dependency_mask: compute_dependency_mask(&spec.inputs, &index),
                output_mask: index.mask(&spec.outputs),
                name: spec.name,
                inputs: spec.inputs,
                outputs: spec.outputs,
                concurrency: spec.concurrency,
                resources: spec.resources,
                factory: spec.factory,
            })
            .collect();

        let mut graph = DiGraph::with_capacity(algorithms.len(), 0);
        for algorithm in &algorithms {
            graph.add_node(algorithm.id);
        }
        for algorithm in &algorithms {
            for key in &algorithm.inputs {
                if let Some(producer) = producers.get(key) {
                    graph.add_edge(
                        NodeIndex::new(*producer),
                        NodeIndex::new(algorithm.id.index()),
                        key.clone(),
                    );
                }
            }
        }

        let cycles: Vec<Vec<AlgorithmId>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut ids: Vec<AlgorithmId> = scc.into_iter().map(|n| graph[n]).collect();
                ids.sort();
                ids
            })
            .collect();

        let mut termination = compute_termination_requirement(&algorithms, &index, &required_outputs);

        for cycle in &cycles {
            let names: Vec<String> = cycle
                .iter()
                .map(|id| algorithms[id.index()].name.clone())
                .collect();
            if reject_cycles {
                return Err(Error::CyclicDependency(names));
            }
            tracing::warn!(
                target: TRACING_TARGET,
                algorithms = %names.join(", "),
                "Cyclic data dependency; affected events will stall"
            );
            for id in cycle {
                termination.union_with(&algorithms[id.index()].output_mask);
            }
        }

        let terminal_algorithms = DataMask::from_bits(
            algorithms.len(),
            algorithms
                .iter()
                .filter(|algorithm| algorithm.outputs.is_empty())
                .map(|algorithm| algorithm.id.index()),
        );

        tracing::info!(
            target: TRACING_TARGET,
            algorithms = algorithms.len(),
            keys = index.len(),
            termination_keys = termination.count_ones(),
            cycles = cycles.len(),
            "Data flow resolved"
        );

        Ok(DataFlow {
            index,
            algorithms,
            termination,
            terminal_algorithms,
            cycles,
            graph,
        })
    }
}

/// The resolved, immutable data flow shared by every slot.
#[derive(Debug)]
pub struct DataFlow {
    index: KeyIndex,
    algorithms: Vec<AlgorithmDescriptor>,
    termination: DataMask,
    terminal_algorithms: DataMask,
    cycles: Vec<Vec<AlgorithmId>>,
    graph: DiGraph<AlgorithmId, DataKey>,
}

impl DataFlow {
    /// Returns all algorithms in declaration order.
    pub fn algorithms(&self) -> &[AlgorithmDescriptor] {
        &self.algorithms
    }

    /// Returns an algorithm by id.
    pub fn algorithm(&self, id: AlgorithmId) -> Option<&AlgorithmDescriptor> {
        self.algorithms.get(id.index())
    }

    /// Finds an algorithm by name.
    pub fn find(&self, name: &str) -> Option<&AlgorithmDescriptor> {
        self.algorithms.iter().find(|algorithm| algorithm.name == name)
    }

    /// Number of algorithms.
    pub fn algorithm_count(&self) -> usize {
        self.algorithms.len()
    }

    /// Returns the key index.
    pub fn keys(&self) -> &KeyIndex {
        &self.index
    }

    /// Keys that must be produced before an event is complete.
    pub fn termination(&self) -> &DataMask {
        &self.termination
    }

    /// Algorithms without outputs; they must run before an event is complete.
    pub fn terminal_algorithms(&self) -> &DataMask {
        &self.terminal_algorithms
    }

    /// Groups of algorithms that depend on each other's outputs.
    pub fn cycles(&self) -> &[Vec<AlgorithmId>] {
        &self.cycles
    }

    /// Returns the algorithms in producer-before-consumer order, or `None` if
    /// the graph is cyclic.
    pub fn topological_order(&self) -> Option<Vec<AlgorithmId>> {
        toposort(&self.graph, None)
            .ok()
            .map(|order| order.into_iter().map(|n| self.graph[n]).collect())
    }

    /// Returns the inputs of an algorithm not yet set in `produced`.
    pub fn missing_inputs(&self, id: AlgorithmId, produced: &DataMask) -> Vec<&DataKey> {
        let Some(algorithm) = self.algorithm(id) else {
            return Vec::new();
        };
        algorithm
            .inputs
            .iter()
            .filter(|key| {
                self.index
                    .get(key.as_str())
                    .is_some_and(|bit| !produced.contains(bit))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{Algorithm, AlgorithmError, AlgorithmSpecBuilder};
    use crate::event::EventContext;
    use crate::store::EventStore;

    struct Noop;

    impl Algorithm for Noop {
        fn execute(&self, _: &EventContext, _: &EventStore) -> Result<(), AlgorithmError> {
            Ok(())
        }
    }

    fn spec(name: &str, inputs: &[&str], outputs: &[&str]) -> AlgorithmSpec {
        let mut builder: AlgorithmSpecBuilder = AlgorithmSpec::builder(name).with_factory(|| Noop);
        for key in inputs {
            builder = builder.with_input(*key);
        }
        for key in outputs {
            builder = builder.with_output(*key);
        }
        builder.build().expect("Valid spec")
    }

    fn abc() -> Vec<AlgorithmSpec> {
        vec![
            spec("A", &[], &["x"]),
            spec("B", &["x"], &["y"]),
            spec("C", &["x"], &["z"]),
        ]
    }

    #[test]
    fn test_index_follows_declaration_order() {
        let index = build_index(&abc());
        assert_eq!(index.len(), 3);
        assert_eq!(index.get("x"), Some(0));
        assert_eq!(index.get("y"), Some(1));
        assert_eq!(index.get("z"), Some(2));
    }

    #[test]
    fn test_resolve_masks_and_termination() {
        let flow = DependencyResolver::new(abc()).resolve().expect("Resolvable");

        let a = flow.find("A").unwrap();
        let b = flow.find("B").unwrap();
        assert!(a.dependency_mask().none());
        assert_eq!(b.dependency_mask().ones().collect::<Vec<_>>(), vec![0]);

        let termination: Vec<&str> = flow
            .termination()
            .ones()
            .map(|bit| flow.keys().key(bit).unwrap().as_str())
            .collect();
        assert_eq!(termination, vec!["y", "z"]);
        assert!(flow.terminal_algorithms().none());
        assert!(flow.cycles().is_empty());
        assert_eq!(flow.topological_order().unwrap()[0], a.id());
    }

    #[test]
    fn test_dangling_dependency_names_key_and_algorithm() {
        let err = DependencyResolver::new(vec![spec("X", &["w"], &[])])
            .resolve()
            .unwrap_err();

        match err {
            Error::DanglingDependency { key, algorithm } => {
                assert_eq!(key.as_str(), "w");
                assert_eq!(algorithm, "X");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_producer_is_rejected() {
        let err = DependencyResolver::new(vec![spec("A", &[], &["x"]), spec("B", &[], &["x"])])
            .resolve()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateProducer { .. }));
    }

    #[test]
    fn test_duplicate_algorithm_is_rejected() {
        let err = DependencyResolver::new(vec![spec("A", &[], &["x"]), spec("A", &[], &["y"])])
            .resolve()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateAlgorithm(name) if name == "A"));
    }

    #[test]
    fn test_data_loader_takes_unmet_inputs() {
        let flow = DependencyResolver::new(vec![
            spec("Loader", &[], &[]),
            spec("X", &["w"], &["out"]),
        ])
        .with_data_loader("Loader")
        .resolve()
        .expect("Resolvable");

        let loader = flow.find("Loader").unwrap();
        assert_eq!(loader.outputs(), &[DataKey::from("w")]);
        assert!(flow.terminal_algorithms().none());
    }

    #[test]
    fn test_unknown_data_loader() {
        let err = DependencyResolver::new(abc())
            .with_data_loader("Missing")
            .resolve()
            .unwrap_err();
        assert!(matches!(err, Error::UnknownDataLoader(_)));
    }

    #[test]
    fn test_cycle_is_detected() {
        let specs = vec![spec("P", &["m"], &["n"]), spec("Q", &["n"], &["m"])];

        let flow = DependencyResolver::new(specs.clone())
            .resolve()
            .expect("Cycles are tolerated by default");
        assert_eq!(flow.cycles().len(), 1);
        assert_eq!(flow.termination().count_ones(), 2);
        assert!(flow.topological_order().is_none());

        let err = DependencyResolver::new(specs)
            .with_reject_cycles(true)
            .resolve()
            .unwrap_err();
        assert!(matches!(err, Error::CyclicDependency(names) if names == ["P", "Q"]));
    }

    #[test]
    fn test_required_outputs_extend_termination() {
        let flow = DependencyResolver::new(abc())
            .with_required_outputs(["x"])
            .resolve()
            .expect("Resolvable");
        assert_eq!(flow.termination().count_ones(), 3);

        let err = DependencyResolver::new(abc())
            .with_required_outputs(["nope"])
            .resolve()
            .unwrap_err();
        assert!(matches!(err, Error::UnproducedOutput(_)));
    }

    #[test]
    fn test_missing_inputs() {
        let flow = DependencyResolver::new(abc()).resolve().expect("Resolvable");
        let b = flow.find("B").unwrap().id();

        let produced = DataMask::with_len(flow.keys().len());
        assert_eq!(flow.missing_inputs(b, &produced), vec![&DataKey::from("x")]);
    }
}
