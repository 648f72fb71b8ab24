//! Slot scheduler tasks.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

use super::{AlgorithmFailure, EventStatus, FinishedEvent, FinishedEvents, SlotPhase, SlotRun};
use crate::SchedulerConfig;
use crate::algorithm::{AlgorithmError, AlgorithmId};
use crate::error::{Error, Result};
use crate::event::{AbortBridge, EventContext};
use crate::flow::DataFlow;
use crate::pool::{AlgorithmHandle, AlgorithmPool};
use crate::store::{EventStore, Whiteboard};

/// Tracing target for scheduler operations.
const TRACING_TARGET: &str = "hivemill_runtime::scheduler";

/// Message posted by a finished algorithm to its slot task.
struct Completion {
    algorithm: AlgorithmId,
    result: Result<(), AlgorithmError>,
}

struct Shared {
    flow: Arc<DataFlow>,
    pool: Arc<AlgorithmPool>,
    whiteboard: Arc<Whiteboard>,
    aborts: Arc<AbortBridge>,
    workers: Arc<Semaphore>,
    in_flight: Option<Arc<Semaphore>>,
    runs: Mutex<Vec<Option<SlotRun>>>,
    active: AtomicUsize,
    finished: mpsc::UnboundedSender<FinishedEvent>,
}

impl Shared {
    fn runs(&self) -> MutexGuard<'_, Vec<Option<SlotRun>>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Dispatches the algorithms of every in-flight event.
///
/// Each pushed event gets its own task. Ready algorithms are checked out of
/// the [`AlgorithmPool`] and executed on blocking worker threads, gated by a
/// semaphore sized to the configured worker count. Finished events are
/// delivered through [`FinishedEvents`].
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Creates a scheduler and the queue its finished events arrive on.
    pub fn new(
        config: &SchedulerConfig,
        flow: Arc<DataFlow>,
        pool: Arc<AlgorithmPool>,
        whiteboard: Arc<Whiteboard>,
        aborts: Arc<AbortBridge>,
    ) -> (Self, FinishedEvents) {
        let (finished, rx) = mpsc::unbounded_channel();
        let runs = (0..whiteboard.slots())
            .map(|slot| Some(SlotRun::new(slot, &flow)))
            .collect();
        let in_flight = (config.max_algorithms_in_flight > 0)
            .then(|| Arc::new(Semaphore::new(config.max_algorithms_in_flight)));

        tracing::info!(
            target: TRACING_TARGET,
            slots = whiteboard.slots(),
            worker_threads = config.worker_threads,
            max_algorithms_in_flight = config.max_algorithms_in_flight,
            "Scheduler initialized"
        );

        let shared = Shared {
            workers: Arc::new(Semaphore::new(config.worker_threads.max(1))),
            in_flight,
            runs: Mutex::new(runs),
            active: AtomicUsize::new(0),
            flow,
            pool,
            whiteboard,
            aborts,
            finished,
        };

        (
            Self {
                shared: Arc::new(shared),
            },
            FinishedEvents::new(rx),
        )
    }

    /// Number of events pushed and not yet finished.
    pub fn active_events(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Starts scheduling an event in its slot.
    ///
    /// The slot's store must already hold the event root and `abort` must be
    /// the token registered for the event with the [`AbortBridge`]. Must be
    /// called from within a tokio runtime.
    pub fn push_new_event(&self, ctx: EventContext, abort: CancellationToken) -> Result<()> {
        let slot = ctx.slot();
        let store = self.shared.whiteboard.select_slot(slot)?;
        let mut run = {
            let mut runs = self.shared.runs();
            let slots = runs.len();
            runs.get_mut(slot)
                .ok_or(Error::InvalidSlot { slot, slots })?
                .take()
                .ok_or_else(|| Error::Internal(format!("slot {slot} already holds an event")))?
        };

        run.start();
        self.shared.active.fetch_add(1, Ordering::AcqRel);

        tracing::debug!(
            target: TRACING_TARGET,
            slot,
            event = ctx.event_number(),
            "Event scheduled"
        );

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let started = Instant::now();
            let mut failures = Vec::new();
            run_slot(&shared, &mut run, &ctx, &store, &abort, &mut failures).await;

            let finished = FinishedEvent {
                status: run.status(),
                produced: run.produced().clone(),
                completed: run.completed().clone(),
                failures,
                elapsed: started.elapsed(),
                context: ctx,
            };

            shared.aborts.unregister(slot, finished.context.event_number());
            if let Some(entry) = shared.runs().get_mut(slot) {
                *entry = Some(run);
            }
            shared.active.fetch_sub(1, Ordering::AcqRel);

            tracing::debug!(
                target: TRACING_TARGET,
                slot,
                event = finished.context.event_number(),
                status = %finished.status,
                elapsed_ms = finished.elapsed.as_millis() as u64,
                "Event finished"
            );

            let _ = shared.finished.send(finished);
        });

        Ok(())
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("slots", &self.shared.whiteboard.slots())
            .field("active_events", &self.active_events())
            .finish_non_exhaustive()
    }
}

/// Drives one event from `Running` to `Done`.
async fn run_slot(
    shared: &Arc<Shared>,
    run: &mut SlotRun,
    ctx: &EventContext,
    store: &Arc<EventStore>,
    abort: &CancellationToken,
    failures: &mut Vec<AlgorithmFailure>,
) {
    let flow = &shared.flow;
    let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();
    let mut released = shared.pool.subscribe();

    loop {
        // Mark releases seen before trying to acquire, so none is missed.
        released.borrow_and_update();

        if abort.is_cancelled() {
            run.abort();
        }

        let deferred = launch_ready(shared, run, ctx, store, &tx, failures);

        if run.is_stalled(flow) {
            report_stall(flow, run, ctx);
            run.stall();
        }

        if run.advance(flow) == SlotPhase::Done {
            break;
        }

        tokio::select! {
            completion = rx.recv() => {
                if let Some(completion) = completion {
                    on_completion(flow, run, ctx, completion, failures);
                }
            }
            _ = abort.cancelled(), if !run.is_halted() => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    slot = ctx.slot(),
                    event = ctx.event_number(),
                    "Event aborted; draining in-flight algorithms"
                );
                run.abort();
            }
            _ = released.changed(), if deferred => {}
        }
    }
}

/// Launches every ready algorithm an instance is available for.
///
/// Returns `true` if a ready algorithm had to be deferred.
fn launch_ready(
    shared: &Arc<Shared>,
    run: &mut SlotRun,
    ctx: &EventContext,
    store: &Arc<EventStore>,
    tx: &mpsc::UnboundedSender<Completion>,
    failures: &mut Vec<AlgorithmFailure>,
) -> bool {
    let mut deferred = false;

    for id in run.ready_algorithms(&shared.flow) {
        let permit = match &shared.in_flight {
            Some(in_flight) => match Arc::clone(in_flight).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    deferred = true;
                    break;
                }
            },
            None => None,
        };

        match shared.pool.acquire(id) {
            Ok(Some(handle)) => {
                run.mark_launched(id);
                tracing::trace!(
                    target: TRACING_TARGET,
                    slot = ctx.slot(),
                    event = ctx.event_number(),
                    algorithm = name(&shared.flow, id),
                    "Algorithm dispatched"
                );
                spawn_algorithm(shared, handle, permit, ctx.clone(), Arc::clone(store), tx.clone());
            }
            Ok(None) => deferred = true,
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    slot = ctx.slot(),
                    event = ctx.event_number(),
                    algorithm = name(&shared.flow, id),
                    error = %err,
                    "Failed to acquire algorithm instance"
                );
                failures.push(AlgorithmFailure {
                    algorithm: name(&shared.flow, id).to_owned(),
                    message: err.to_string(),
                });
                run.fail(EventStatus::Other);
                break;
            }
        }
    }

    deferred
}

/// Executes an algorithm on a blocking worker and posts its completion.
fn spawn_algorithm(
    shared: &Arc<Shared>,
    handle: AlgorithmHandle,
    in_flight: Option<OwnedSemaphorePermit>,
    ctx: EventContext,
    store: Arc<EventStore>,
    tx: mpsc::UnboundedSender<Completion>,
) {
    let workers = Arc::clone(&shared.workers);
    let pool = Arc::clone(&shared.pool);
    let algorithm = handle.id();

    tokio::spawn(async move {
        let result = match workers.acquire_owned().await {
            Ok(worker) => {
                let joined = tokio::task::spawn_blocking(move || {
                    let result = catch_unwind(AssertUnwindSafe(|| handle.execute(&ctx, &store)))
                        .unwrap_or_else(|_| Err(AlgorithmError::new("algorithm panicked")));
                    drop(worker);
                    (handle, result)
                })
                .await;

                match joined {
                    Ok((handle, result)) => {
                        drop(in_flight);
                        pool.release(handle);
                        result
                    }
                    Err(err) => Err(AlgorithmError::with_source("worker task failed", err)),
                }
            }
            Err(err) => {
                drop(in_flight);
                pool.release(handle);
                Err(AlgorithmError::with_source("worker pool closed", err))
            }
        };

        let _ = tx.send(Completion { algorithm, result });
    });
}

fn on_completion(
    flow: &DataFlow,
    run: &mut SlotRun,
    ctx: &EventContext,
    completion: Completion,
    failures: &mut Vec<AlgorithmFailure>,
) {
    let Completion { algorithm, result } = completion;

    match result {
        Ok(()) => {
            tracing::trace!(
                target: TRACING_TARGET,
                slot = ctx.slot(),
                event = ctx.event_number(),
                algorithm = name(flow, algorithm),
                "Algorithm completed"
            );
            run.complete(flow, algorithm, true);
        }
        Err(err) => {
            tracing::warn!(
                target: TRACING_TARGET,
                slot = ctx.slot(),
                event = ctx.event_number(),
                algorithm = name(flow, algorithm),
                error = %err,
                "Algorithm failed"
            );
            failures.push(AlgorithmFailure {
                algorithm: name(flow, algorithm).to_owned(),
                message: err.to_string(),
            });
            run.complete(flow, algorithm, false);
        }
    }
}

fn report_stall(flow: &DataFlow, run: &SlotRun, ctx: &EventContext) {
    tracing::error!(
        target: TRACING_TARGET,
        slot = ctx.slot(),
        event = ctx.event_number(),
        "Event stalled: no algorithm can run and required outputs are missing"
    );

    for algorithm in flow.algorithms() {
        if run.completed().contains(algorithm.id().index()) {
            tracing::debug!(
                target: TRACING_TARGET,
                slot = ctx.slot(),
                algorithm = algorithm.name(),
                "Algorithm ran"
            );
            continue;
        }

        let missing: Vec<&str> = flow
            .missing_inputs(algorithm.id(), run.produced())
            .into_iter()
            .map(|key| key.as_str())
            .collect();
        tracing::error!(
            target: TRACING_TARGET,
            slot = ctx.slot(),
            algorithm = algorithm.name(),
            missing = ?missing,
            "Algorithm could not run"
        );
    }
}

fn name(flow: &DataFlow, id: AlgorithmId) -> &str {
    flow.algorithm(id).map_or("?", |algorithm| algorithm.name())
}
