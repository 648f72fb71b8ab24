//! Incident notifications.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::scheduler::EventStatus;

/// Tracing target for incident delivery.
const TRACING_TARGET: &str = "hivemill_runtime::incident";

/// Asynchronous notification delivered to registered listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incident {
    /// An event was loaded into a slot.
    BeginEvent {
        /// Slot index.
        slot: usize,
        /// Event number.
        event: u64,
    },
    /// An event left its slot.
    EndEvent {
        /// Slot index.
        slot: usize,
        /// Event number.
        event: u64,
        /// Final event status.
        status: EventStatus,
    },
    /// Stop scheduling algorithms for the event in a slot.
    AbortEvent {
        /// Slot index.
        slot: usize,
        /// Restricts the abort to this event; `None` aborts whatever the slot
        /// holds.
        event: Option<u64>,
        /// Who requested the abort.
        source: String,
    },
    /// Stop pulling new events; in-flight events drain.
    StopRun {
        /// Who requested the stop.
        source: String,
    },
}

impl fmt::Display for Incident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeginEvent { .. } => f.write_str("BeginEvent"),
            Self::EndEvent { .. } => f.write_str("EndEvent"),
            Self::AbortEvent { .. } => f.write_str("AbortEvent"),
            Self::StopRun { .. } => f.write_str("StopRun"),
        }
    }
}

/// Receives incidents.
///
/// Listeners are called on the thread that fires the incident and may fire
/// further incidents.
pub trait IncidentListener: Send + Sync {
    /// Handles one incident.
    fn handle(&self, incident: &Incident);
}

/// Fan-out of incidents to listeners.
#[derive(Default)]
pub struct IncidentBus {
    listeners: RwLock<Vec<Arc<dyn IncidentListener>>>,
}

impl IncidentBus {
    /// Creates a bus without listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener.
    pub fn add_listener(&self, listener: Arc<dyn IncidentListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Delivers an incident to every listener.
    pub fn fire(&self, incident: &Incident) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        tracing::trace!(
            target: TRACING_TARGET,
            incident = %incident,
            listeners = listeners.len(),
            "Firing incident"
        );

        for listener in listeners {
            listener.handle(incident);
        }
    }
}

impl fmt::Debug for IncidentBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncidentBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
