//! Pool bookkeeping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use super::{AlgorithmHandle, AlgorithmStats, PoolStats};
use crate::algorithm::{Algorithm, AlgorithmId, Concurrency, LifecyclePhase};
use crate::error::{Error, Result};
use crate::flow::{DataFlow, DataMask};

/// Tracing target for pool operations.
const TRACING_TARGET: &str = "hivemill_runtime::pool";

#[derive(Default)]
struct PoolEntry {
    /// Instances ready to be handed out.
    idle: Vec<Arc<dyn Algorithm>>,
    /// Every instance created so far.
    instances: Vec<Arc<dyn Algorithm>>,
    /// Instances created or being created.
    reserved: usize,
    busy: usize,
    acquired: u64,
    misses: u64,
    resources: DataMask,
}

#[derive(Default)]
struct PoolState {
    entries: Vec<PoolEntry>,
    busy_resources: DataMask,
    started: bool,
}

enum Checkout {
    Ready(Arc<dyn Algorithm>),
    Create { started: bool },
}

/// Shared pool of algorithm instances.
///
/// The lock only guards bookkeeping; instance creation, lifecycle hooks and
/// execution all happen outside of it. Every release bumps a generation
/// counter that deferred schedulers watch to retry.
pub struct AlgorithmPool {
    flow: Arc<DataFlow>,
    state: Mutex<PoolState>,
    released: watch::Sender<u64>,
}

impl AlgorithmPool {
    /// Creates an empty pool for the algorithms of a data flow.
    ///
    /// Named resources are assigned bits in first-declared order.
    pub fn new(flow: Arc<DataFlow>) -> Self {
        let (entries, resource_count) = {
            let mut resource_bits: HashMap<&str, usize> = HashMap::new();
            let entries: Vec<PoolEntry> = flow
                .algorithms()
                .iter()
                .map(|algorithm| {
                    let mut resources = DataMask::default();
                    for name in algorithm.resources() {
                        let next = resource_bits.len();
                        resources.insert(*resource_bits.entry(name.as_str()).or_insert(next));
                    }
                    PoolEntry {
                        resources,
                        ..PoolEntry::default()
                    }
                })
                .collect();
            (entries, resource_bits.len())
        };

        let state = PoolState {
            entries,
            busy_resources: DataMask::with_len(resource_count),
            started: false,
        };
        let (released, _) = watch::channel(0);

        Self {
            flow,
            state: Mutex::new(state),
            released,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn name(&self, id: AlgorithmId) -> &str {
        self.flow.algorithm(id).map_or("?", |algorithm| algorithm.name())
    }

    /// Subscribes to release notifications.
    ///
    /// The value is a generation counter incremented on every release.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.released.subscribe()
    }

    /// Checks out an instance of an algorithm.
    ///
    /// Returns `Ok(None)` if no instance or one of the algorithm's resources
    /// is free; the caller should retry after the next release. Clonable
    /// algorithms get a new clone if all existing ones are busy and the
    /// cardinality allows it. Re-entrant instances are never consumed.
    pub fn acquire(&self, id: AlgorithmId) -> Result<Option<AlgorithmHandle>> {
        let descriptor = self.flow.algorithm(id).ok_or(Error::UnknownAlgorithm(id))?;
        let concurrency = descriptor.concurrency();

        let checkout = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let entry = &mut state.entries[id.index()];

            if !entry.resources.is_disjoint(&state.busy_resources) {
                entry.misses += 1;
                tracing::trace!(
                    target: TRACING_TARGET,
                    algorithm = descriptor.name(),
                    "Resource busy"
                );
                return Ok(None);
            }

            let checkout = match concurrency {
                Concurrency::Reentrant if !entry.instances.is_empty() => {
                    Checkout::Ready(Arc::clone(&entry.instances[0]))
                }
                _ => match entry.idle.pop() {
                    Some(instance) => Checkout::Ready(instance),
                    None if entry.reserved < concurrency.max_instances() => {
                        entry.reserved += 1;
                        Checkout::Create {
                            started: state.started,
                        }
                    }
                    None => {
                        entry.misses += 1;
                        tracing::trace!(
                            target: TRACING_TARGET,
                            algorithm = descriptor.name(),
                            "No instance available"
                        );
                        return Ok(None);
                    }
                },
            };

            entry.busy += 1;
            entry.acquired += 1;
            state.busy_resources.union_with(&entry.resources);
            checkout
        };

        let instance = match checkout {
            Checkout::Ready(instance) => instance,
            Checkout::Create { started } => match self.create_instance(id, started) {
                Ok(instance) => instance,
                Err(err) => {
                    let mut guard = self.lock();
                    let state = &mut *guard;
                    let entry = &mut state.entries[id.index()];
                    entry.reserved -= 1;
                    entry.busy -= 1;
                    state.busy_resources.difference_with(&entry.resources);
                    drop(guard);
                    self.notify();
                    return Err(err);
                }
            },
        };

        tracing::trace!(
            target: TRACING_TARGET,
            algorithm = descriptor.name(),
            "Instance acquired"
        );

        Ok(Some(AlgorithmHandle { id, instance }))
    }

    /// Returns an instance and its resources to the pool and wakes waiters.
    pub fn release(&self, handle: AlgorithmHandle) {
        let AlgorithmHandle { id, instance } = handle;
        let reentrant = self
            .flow
            .algorithm(id)
            .is_some_and(|algorithm| algorithm.concurrency().is_reentrant());

        {
            let mut guard = self.lock();
            let state = &mut *guard;
            let Some(entry) = state.entries.get_mut(id.index()) else {
                return;
            };
            entry.busy = entry.busy.saturating_sub(1);
            if !reentrant {
                entry.idle.push(instance);
            }
            state.busy_resources.difference_with(&entry.resources);
        }

        tracing::trace!(target: TRACING_TARGET, algorithm = self.name(id), "Instance released");
        self.notify();
    }

    fn notify(&self) {
        self.released.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    /// Creates an instance, brings it up to the pool's lifecycle state and
    /// records it.
    fn create_instance(&self, id: AlgorithmId, started: bool) -> Result<Arc<dyn Algorithm>> {
        let descriptor = self.flow.algorithm(id).ok_or(Error::UnknownAlgorithm(id))?;
        let instance = descriptor.factory().create();

        run_phase(descriptor.name(), LifecyclePhase::Initialize, instance.as_ref())?;
        if started {
            run_phase(descriptor.name(), LifecyclePhase::Start, instance.as_ref())?;
        }

        let count = {
            let mut state = self.lock();
            let entry = &mut state.entries[id.index()];
            entry.instances.push(Arc::clone(&instance));
            entry.instances.len()
        };

        tracing::debug!(
            target: TRACING_TARGET,
            algorithm = descriptor.name(),
            instances = count,
            "Algorithm instance created"
        );

        Ok(instance)
    }

    /// Creates and initializes the first instance of every algorithm.
    pub fn initialize(&self) -> Result<()> {
        for descriptor in self.flow.algorithms() {
            let id = descriptor.id();
            {
                let mut state = self.lock();
                let entry = &mut state.entries[id.index()];
                if entry.reserved > 0 {
                    continue;
                }
                entry.reserved = 1;
            }

            match self.create_instance(id, false) {
                Ok(instance) => self.lock().entries[id.index()].idle.push(instance),
                Err(err) => {
                    self.lock().entries[id.index()].reserved = 0;
                    return Err(err);
                }
            }
        }

        tracing::info!(
            target: TRACING_TARGET,
            algorithms = self.flow.algorithm_count(),
            "Algorithm pool initialized"
        );
        Ok(())
    }

    /// Starts every instance. Clones created later are started on creation.
    pub fn start(&self) -> Result<()> {
        self.run_all(LifecyclePhase::Start)?;
        self.lock().started = true;
        Ok(())
    }

    /// Stops every instance.
    pub fn stop(&self) -> Result<()> {
        self.lock().started = false;
        self.run_all(LifecyclePhase::Stop)
    }

    /// Finalizes and drops every instance.
    pub fn finalize(&self) -> Result<()> {
        let result = self.run_all(LifecyclePhase::Finalize);

        let stats = self.stats();
        for algorithm in stats.algorithms.iter().filter(|stats| stats.misses > 0) {
            tracing::info!(
                target: TRACING_TARGET,
                algorithm = %algorithm.name,
                instances = algorithm.instances,
                misses = algorithm.misses,
                "Instance misses"
            );
        }

        let mut state = self.lock();
        for entry in &mut state.entries {
            entry.idle.clear();
            entry.instances.clear();
            entry.reserved = 0;
        }
        result
    }

    fn run_all(&self, phase: LifecyclePhase) -> Result<()> {
        let instances: Vec<(AlgorithmId, Vec<Arc<dyn Algorithm>>)> = {
            let state = self.lock();
            state
                .entries
                .iter()
                .enumerate()
                .map(|(i, entry)| (AlgorithmId::new(i), entry.instances.clone()))
                .collect()
        };

        for (id, instances) in instances {
            for instance in instances {
                run_phase(self.name(id), phase, instance.as_ref())?;
            }
        }

        tracing::debug!(target: TRACING_TARGET, phase = %phase, "Lifecycle phase completed");
        Ok(())
    }

    /// Returns a snapshot of the usage counters.
    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        let algorithms = self
            .flow
            .algorithms()
            .iter()
            .zip(&state.entries)
            .map(|(descriptor, entry)| AlgorithmStats {
                name: descriptor.name().to_owned(),
                instances: entry.instances.len(),
                busy: entry.busy,
                acquired: entry.acquired,
                misses: entry.misses,
            })
            .collect();
        PoolStats { algorithms }
    }
}

impl std::fmt::Debug for AlgorithmPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgorithmPool")
            .field("algorithms", &self.flow.algorithm_count())
            .finish_non_exhaustive()
    }
}

fn run_phase(name: &str, phase: LifecyclePhase, instance: &dyn Algorithm) -> Result<()> {
    phase.invoke(instance).map_err(|source| Error::Lifecycle {
        algorithm: name.to_owned(),
        phase,
        source,
    })
}
