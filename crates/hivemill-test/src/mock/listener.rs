//! Incident recording listener.

use std::sync::{Mutex, PoisonError};

use hivemill_runtime::event::{Incident, IncidentListener};

/// Collects every incident it receives.
#[derive(Debug, Default)]
pub struct RecordingListener {
    incidents: Mutex<Vec<Incident>>,
}

impl RecordingListener {
    /// Creates an empty listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the received incidents in delivery order.
    pub fn incidents(&self) -> Vec<Incident> {
        self.incidents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `BeginEvent` incidents for an event.
    pub fn begin_count(&self, event: u64) -> usize {
        self.incidents()
            .iter()
            .filter(|incident| matches!(incident, Incident::BeginEvent { event: e, .. } if *e == event))
            .count()
    }

    /// Number of `EndEvent` incidents for an event.
    pub fn end_count(&self, event: u64) -> usize {
        self.incidents()
            .iter()
            .filter(|incident| matches!(incident, Incident::EndEvent { event: e, .. } if *e == event))
            .count()
    }
}

impl IncidentListener for RecordingListener {
    fn handle(&self, incident: &Incident) {
        self.incidents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(incident.clone());
    }
}
