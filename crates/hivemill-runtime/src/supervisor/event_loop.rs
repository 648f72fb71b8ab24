//! Slim event loop.

use std::sync::Arc;
use std::time::Instant;

use super::{LoopState, RunSummary, SlotState, StopHandle, StopReason};
use crate::algorithm::AlgorithmSpec;
use crate::error::{Error, Result};
use crate::event::{
    AbortBridge, EventContext, EventSelector, Incident, IncidentBus, IncidentListener, Selection,
    SelectorContext,
};
use crate::flow::{DataFlow, DependencyResolver};
use crate::pool::AlgorithmPool;
use crate::scheduler::{FinishedEvent, Scheduler};
use crate::store::{EventAddress, Whiteboard};
use crate::{EventLoopConfig, SchedulerConfig};

/// Tracing target for event loop operations.
const TRACING_TARGET: &str = "hivemill_runtime::supervisor";

/// Result of asking the selector for the next event.
enum NextEvent {
    Loaded(Option<EventAddress>),
    Exhausted,
}

/// Drives events through a fixed pool of slots.
///
/// # Lifecycle
///
/// `Configured` → [`initialize`](Self::initialize) → `Initialized` →
/// [`start`](Self::start) → `Started` → [`next_event`](Self::next_event) (any
/// number of times) → [`stop`](Self::stop) → `Stopped` →
/// [`finalize`](Self::finalize) → `Finalized`. A stopped loop may be started
/// again.
pub struct EventLoop {
    scheduler_config: SchedulerConfig,
    config: EventLoopConfig,
    state: LoopState,
    flow: Arc<DataFlow>,
    pool: Arc<AlgorithmPool>,
    whiteboard: Arc<Whiteboard>,
    incidents: Arc<IncidentBus>,
    aborts: Arc<AbortBridge>,
    selector: Option<Box<dyn EventSelector>>,
    selector_context: Option<SelectorContext>,
    slots: Vec<SlotState>,
    next_event_number: u64,
}

impl EventLoop {
    /// Resolves the algorithms and builds the slot pool.
    ///
    /// Fails on any configuration error before an event is processed.
    pub fn new(
        scheduler_config: SchedulerConfig,
        config: EventLoopConfig,
        specs: Vec<AlgorithmSpec>,
    ) -> Result<Self> {
        scheduler_config.validate()?;

        let mut resolver = DependencyResolver::new(specs)
            .with_required_outputs(scheduler_config.required_outputs.iter().map(String::as_str))
            .with_reject_cycles(scheduler_config.reject_cycles);
        if let Some(data_loader) = &scheduler_config.data_loader {
            resolver = resolver.with_data_loader(data_loader.as_str());
        }
        let flow = Arc::new(resolver.resolve()?);

        let pool = Arc::new(AlgorithmPool::new(Arc::clone(&flow)));
        let whiteboard = Arc::new(Whiteboard::new(scheduler_config.event_slots));
        let incidents = Arc::new(IncidentBus::new());
        let aborts = Arc::new(AbortBridge::new());
        incidents.add_listener(Arc::clone(&aborts) as Arc<dyn IncidentListener>);

        tracing::info!(
            target: TRACING_TARGET,
            slots = scheduler_config.event_slots,
            algorithms = flow.algorithm_count(),
            "Event loop configured"
        );

        Ok(Self {
            slots: vec![SlotState::Free; scheduler_config.event_slots],
            scheduler_config,
            config,
            state: LoopState::Configured,
            flow,
            pool,
            whiteboard,
            incidents,
            aborts,
            selector: None,
            selector_context: None,
            next_event_number: 0,
        })
    }

    /// Sets the source of events.
    ///
    /// Without a selector, events carry no address and the run must be
    /// bounded by a maximum event count.
    pub fn with_selector(mut self, selector: impl EventSelector + 'static) -> Self {
        self.selector = Some(Box::new(selector));
        self
    }

    /// Registers an incident listener.
    pub fn with_listener(self, listener: Arc<dyn IncidentListener>) -> Self {
        self.incidents.add_listener(listener);
        self
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Returns the resolved data flow.
    pub fn flow(&self) -> &Arc<DataFlow> {
        &self.flow
    }

    /// Returns the whiteboard.
    pub fn whiteboard(&self) -> &Arc<Whiteboard> {
        &self.whiteboard
    }

    /// Returns the algorithm pool.
    pub fn pool(&self) -> &Arc<AlgorithmPool> {
        &self.pool
    }

    /// Returns the incident bus.
    pub fn incidents(&self) -> &Arc<IncidentBus> {
        &self.incidents
    }

    /// Returns the supervisor's view of every slot.
    pub fn slot_states(&self) -> &[SlotState] {
        &self.slots
    }

    /// Returns a handle that stops the run from another task.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            incidents: Arc::clone(&self.incidents),
            aborts: Arc::clone(&self.aborts),
        }
    }

    fn expect_state(&self, expected: &[LoopState]) -> Result<()> {
        if expected.contains(&self.state) {
            return Ok(());
        }
        Err(Error::InvalidState {
            expected: expected[0],
            actual: self.state,
        })
    }

    fn transition(&mut self, state: LoopState) {
        tracing::info!(
            target: TRACING_TARGET,
            from = %self.state,
            to = %state,
            "Event loop state changed"
        );
        self.state = state;
    }

    /// Creates and initializes the algorithm instances.
    pub fn initialize(&mut self) -> Result<()> {
        self.expect_state(&[LoopState::Configured])?;
        self.pool.initialize()?;
        self.transition(LoopState::Initialized);
        Ok(())
    }

    /// Starts the algorithms and opens the selector context.
    pub fn start(&mut self) -> Result<()> {
        self.expect_state(&[LoopState::Initialized, LoopState::Stopped])?;
        self.pool.start()?;
        if let Some(selector) = self.selector.as_mut() {
            self.selector_context = Some(selector.create_context()?);
        }
        self.transition(LoopState::Started);
        Ok(())
    }

    /// Processes events until `max_events` were pulled (unbounded if `None`),
    /// the selector is exhausted, a stop is requested or the failure
    /// threshold is reached. In-flight events always drain before returning.
    ///
    /// Failing events do not make this return an error; they are counted in
    /// the [`RunSummary`]. A selector or bookkeeping error stops pulling and
    /// is returned once the in-flight events drained. A pending stop request
    /// is consumed when it ends the pulling.
    pub async fn next_event(&mut self, max_events: Option<u64>) -> Result<RunSummary> {
        self.expect_state(&[LoopState::Started])?;
        if self.selector.is_none() && max_events.is_none() {
            return Err(Error::InvalidConfig(
                "an unbounded run requires an event selector".into(),
            ));
        }

        let (scheduler, mut finished) = Scheduler::new(
            &self.scheduler_config,
            Arc::clone(&self.flow),
            Arc::clone(&self.pool),
            Arc::clone(&self.whiteboard),
            Arc::clone(&self.aborts),
        );

        tracing::info!(
            target: TRACING_TARGET,
            max_events = ?max_events,
            "Starting event processing"
        );

        let started = Instant::now();
        let mut summary = RunSummary::new(StopReason::SelectorExhausted);
        let mut pulled: u64 = 0;
        let mut in_flight: usize = 0;
        let mut pulling = true;
        let mut failure: Option<Error> = None;

        loop {
            while let Some(event) = finished.try_pop() {
                in_flight -= 1;
                if let Err(err) = self.drain_event(event, &mut summary) {
                    record_failure(&mut failure, err);
                    pulling = false;
                }
            }

            if pulling && let Some(reason) = self.stop_reason(max_events, pulled, &summary) {
                tracing::info!(target: TRACING_TARGET, reason = %reason, "Stopped pulling events");
                summary.stop_reason = reason;
                pulling = false;
            }

            if pulling && let Some(slot) = self.whiteboard.allocate_store(self.next_event_number) {
                let loaded = match self.next_address() {
                    Ok(NextEvent::Loaded(address)) => {
                        self.load_event(&scheduler, slot, address).map(|()| true)
                    }
                    Ok(NextEvent::Exhausted) => {
                        tracing::info!(target: TRACING_TARGET, pulled, "Event selector exhausted");
                        summary.stop_reason = StopReason::SelectorExhausted;
                        Ok(false)
                    }
                    Err(err) => Err(err),
                };
                match loaded {
                    Ok(true) => {
                        pulled += 1;
                        in_flight += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(err) => record_failure(&mut failure, err),
                }
                self.slots[slot] = SlotState::Free;
                if let Err(err) = self.whiteboard.free_store(slot) {
                    record_failure(&mut failure, err);
                }
                pulling = false;
                continue;
            }

            if in_flight == 0 {
                if pulling {
                    record_failure(
                        &mut failure,
                        Error::Internal("no free slot while no event is in flight".into()),
                    );
                }
                break;
            }

            // Backpressure: every slot is busy or no more events are pulled.
            let Some(event) = finished.pop().await else {
                record_failure(
                    &mut failure,
                    Error::Internal("scheduler dropped finished events".into()),
                );
                break;
            };
            in_flight -= 1;
            if let Err(err) = self.drain_event(event, &mut summary) {
                record_failure(&mut failure, err);
                pulling = false;
            }
        }

        summary.elapsed = started.elapsed();
        summary.pool = self.pool.stats();

        tracing::info!(
            target: TRACING_TARGET,
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            stalled = summary.stalled,
            aborted = summary.aborted,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Event processing finished"
        );

        match failure {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    }

    /// Processes events bounded by the configured maximum.
    pub async fn run(&mut self) -> Result<RunSummary> {
        self.next_event(self.config.max_events).await
    }

    /// Runs the whole lifecycle: initialize, start, process, stop, finalize.
    pub async fn execute_run(&mut self, max_events: Option<u64>) -> Result<RunSummary> {
        self.initialize()?;
        self.start()?;
        let result = self.next_event(max_events).await;
        self.stop()?;
        self.finalize()?;
        result
    }

    /// Stops the algorithms and releases the selector context.
    pub fn stop(&mut self) -> Result<()> {
        self.expect_state(&[LoopState::Started])?;
        if let (Some(selector), Some(context)) =
            (self.selector.as_mut(), self.selector_context.take())
        {
            selector.release_context(context)?;
        }
        self.pool.stop()?;
        self.transition(LoopState::Stopped);
        Ok(())
    }

    /// Finalizes and drops the algorithm instances.
    pub fn finalize(&mut self) -> Result<()> {
        self.expect_state(&[LoopState::Stopped, LoopState::Initialized])?;
        self.pool.finalize()?;
        self.transition(LoopState::Finalized);
        Ok(())
    }

    fn stop_reason(
        &self,
        max_events: Option<u64>,
        pulled: u64,
        summary: &RunSummary,
    ) -> Option<StopReason> {
        if max_events.is_some_and(|max| pulled >= max) {
            Some(StopReason::MaxEvents)
        } else if self.aborts.take_stop_request() {
            Some(StopReason::StopRequested)
        } else if self.config.failure_threshold_reached(summary.failed_events()) {
            Some(StopReason::FailureThreshold)
        } else {
            None
        }
    }

    /// Advances the selector; retries once if no address could be created.
    fn next_address(&mut self) -> Result<NextEvent> {
        let (Some(selector), Some(context)) =
            (self.selector.as_mut(), self.selector_context.as_mut())
        else {
            return Ok(NextEvent::Loaded(None));
        };

        for attempt in 0..2 {
            if selector.next(context)? == Selection::Exhausted {
                return Ok(NextEvent::Exhausted);
            }
            if let Some(address) = selector.create_address(context)? {
                return Ok(NextEvent::Loaded(Some(address)));
            }
            tracing::warn!(
                target: TRACING_TARGET,
                attempt,
                "Event selector produced no address"
            );
        }

        Ok(NextEvent::Loaded(None))
    }

    /// Loads an event into a slot and hands it to the scheduler.
    ///
    /// The abort token is registered before `BeginEvent` fires, so listeners
    /// may already abort the event.
    fn load_event(
        &mut self,
        scheduler: &Scheduler,
        slot: usize,
        address: Option<EventAddress>,
    ) -> Result<()> {
        let event = self.next_event_number;
        self.next_event_number += 1;
        self.slots[slot] = SlotState::Loading;

        self.whiteboard.set_root(slot, address.clone())?;
        let ctx = EventContext::new(event, slot)
            .with_address(address)
            .with_incidents(Arc::clone(&self.incidents));
        let abort = self.aborts.register(slot, event);

        tracing::debug!(target: TRACING_TARGET, slot, event, "Begin event");
        self.incidents.fire(&Incident::BeginEvent { slot, event });

        if let Err(err) = scheduler.push_new_event(ctx, abort) {
            self.aborts.unregister(slot, event);
            return Err(err);
        }
        self.slots[slot] = SlotState::Processing;
        Ok(())
    }

    fn drain_event(&mut self, event: FinishedEvent, summary: &mut RunSummary) -> Result<()> {
        let slot = event.context.slot();
        let number = event.context.event_number();
        self.slots[slot] = SlotState::Draining;

        tracing::debug!(
            target: TRACING_TARGET,
            slot,
            event = number,
            status = %event.status,
            "End event"
        );
        self.incidents.fire(&Incident::EndEvent {
            slot,
            event: number,
            status: event.status,
        });

        summary.record(event.status);
        self.whiteboard.free_store(slot)?;
        self.slots[slot] = SlotState::Free;
        Ok(())
    }
}

/// Keeps the first error of a run; later ones are only logged.
fn record_failure(failure: &mut Option<Error>, err: Error) {
    tracing::error!(target: TRACING_TARGET, error = %err, "Event processing failed");
    failure.get_or_insert(err);
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("state", &self.state)
            .field("slots", &self.slots)
            .field("next_event_number", &self.next_event_number)
            .finish_non_exhaustive()
    }
}

