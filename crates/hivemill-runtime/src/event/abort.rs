//! Abort-event and stop-run handling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use super::{Incident, IncidentListener};

/// Tracing target for abort handling.
const TRACING_TARGET: &str = "hivemill_runtime::abort";

/// Translates `AbortEvent` and `StopRun` incidents into cancellation.
///
/// A token is registered per event before its `BeginEvent` fires; cancelling
/// it stops further dispatch for that slot only. Running algorithms are never
/// interrupted. A stop request stays pending until the event loop acts on it.
#[derive(Debug, Default)]
pub struct AbortBridge {
    events: Mutex<HashMap<usize, (u64, CancellationToken)>>,
    stop: AtomicBool,
}

impl AbortBridge {
    /// Creates a bridge with no registered events.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<usize, (u64, CancellationToken)>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers the event running in a slot and returns its abort token.
    pub fn register(&self, slot: usize, event: u64) -> CancellationToken {
        let token = CancellationToken::new();
        self.lock().insert(slot, (event, token.clone()));
        token
    }

    /// Forgets the event running in a slot.
    pub fn unregister(&self, slot: usize, event: u64) {
        let mut events = self.lock();
        if events.get(&slot).is_some_and(|(current, _)| *current == event) {
            events.remove(&slot);
        }
    }

    /// Aborts the event in a slot.
    ///
    /// With `event` set, only that event is aborted, so a late request never
    /// hits a later event reusing the slot. Returns whether a token was
    /// cancelled.
    pub fn abort(&self, slot: usize, event: Option<u64>) -> bool {
        let events = self.lock();
        let Some((current, token)) = events.get(&slot) else {
            return false;
        };
        if event.is_some_and(|event| event != *current) {
            return false;
        }

        tracing::debug!(target: TRACING_TARGET, slot, event = *current, "Aborting event");
        token.cancel();
        true
    }

    /// Requests the run to stop pulling new events.
    pub fn request_stop(&self) {
        if !self.stop.swap(true, Ordering::AcqRel) {
            tracing::info!(target: TRACING_TARGET, "Stop of the run requested");
        }
    }

    /// Returns whether a stop is pending.
    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Consumes a pending stop request.
    pub fn take_stop_request(&self) -> bool {
        self.stop.swap(false, Ordering::AcqRel)
    }
}

impl IncidentListener for AbortBridge {
    fn handle(&self, incident: &Incident) {
        match incident {
            Incident::AbortEvent {
                slot,
                event,
                source,
            } => {
                if !self.abort(*slot, *event) {
                    tracing::debug!(
                        target: TRACING_TARGET,
                        slot,
                        source = %source,
                        "Abort request for a slot without a matching event ignored"
                    );
                }
            }
            Incident::StopRun { .. } => self.request_stop(),
            _ => {}
        }
    }
}
