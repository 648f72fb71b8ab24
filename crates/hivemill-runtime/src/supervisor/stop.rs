//! Scheduled stop requests.

use std::sync::Arc;

use crate::event::{AbortBridge, Incident, IncidentBus};

/// Requests an [`EventLoop`](super::EventLoop) to stop pulling new events.
///
/// Events already in flight drain normally. A request stays pending until a
/// call to [`next_event`](super::EventLoop::next_event) acts on it, so a
/// restarted loop processes events again.
#[derive(Debug, Clone)]
pub struct StopHandle {
    pub(super) incidents: Arc<IncidentBus>,
    pub(super) aborts: Arc<AbortBridge>,
}

impl StopHandle {
    /// Fires a `StopRun` incident.
    pub fn stop_run(&self) {
        self.incidents.fire(&Incident::StopRun {
            source: "StopHandle".into(),
        });
    }

    /// Returns whether a stop request is pending.
    pub fn is_stop_requested(&self) -> bool {
        self.aborts.is_stop_requested()
    }
}
