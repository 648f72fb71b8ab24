//! Per-event context handed to algorithms.

use std::sync::Arc;

use super::{Incident, IncidentBus};
use crate::store::EventAddress;

/// Identity of the event an algorithm is processing.
#[derive(Debug, Clone)]
pub struct EventContext {
    event_number: u64,
    slot: usize,
    address: Option<EventAddress>,
    incidents: Option<Arc<IncidentBus>>,
}

impl EventContext {
    /// Creates a context for an event loaded into a slot.
    pub fn new(event_number: u64, slot: usize) -> Self {
        Self {
            event_number,
            slot,
            address: None,
            incidents: None,
        }
    }

    /// Sets the address the event was loaded from.
    pub fn with_address(mut self, address: Option<EventAddress>) -> Self {
        self.address = address;
        self
    }

    /// Attaches the incident bus used by [`abort_event`](Self::abort_event).
    pub fn with_incidents(mut self, incidents: Arc<IncidentBus>) -> Self {
        self.incidents = Some(incidents);
        self
    }

    /// Returns the event number.
    #[inline]
    pub fn event_number(&self) -> u64 {
        self.event_number
    }

    /// Returns the slot index.
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Returns the address the event was loaded from.
    pub fn address(&self) -> Option<&EventAddress> {
        self.address.as_ref()
    }

    /// Requests that no further algorithms are scheduled for this event.
    ///
    /// Algorithms already running finish normally. Returns `false` if no
    /// incident bus is attached.
    pub fn abort_event(&self, source: impl Into<String>) -> bool {
        let Some(incidents) = &self.incidents else {
            return false;
        };
        incidents.fire(&Incident::AbortEvent {
            slot: self.slot,
            event: Some(self.event_number),
            source: source.into(),
        });
        true
    }
}
