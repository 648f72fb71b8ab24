//! Slot phases and event statuses.

use serde::Serialize;

/// Scheduling phase of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(strum::Display, strum::AsRefStr)]
pub enum SlotPhase {
    /// No event assigned.
    #[default]
    Idle,
    /// Dispatching algorithms.
    Running,
    /// No further launches; waiting for in-flight algorithms.
    Draining,
    /// All in-flight algorithms finished.
    Done,
}

/// Outcome of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[derive(strum::Display, strum::AsRefStr, strum::EnumIter)]
pub enum EventStatus {
    /// Every required output was produced.
    #[default]
    Success,
    /// An algorithm reported a failure.
    AlgFail,
    /// Nothing could run and the event was incomplete.
    AlgStall,
    /// An abort incident stopped scheduling.
    Aborted,
    /// The scheduler itself failed to process the event.
    Other,
}

impl EventStatus {
    /// Returns `true` for [`EventStatus::Success`].
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns `true` for statuses counted against a failure threshold.
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::AlgFail | Self::AlgStall)
    }
}

/// An algorithm failure recorded for an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlgorithmFailure {
    /// Algorithm name.
    pub algorithm: String,
    /// Reported error.
    pub message: String,
}
