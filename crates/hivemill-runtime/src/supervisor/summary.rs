//! End-of-run summary.

use std::time::Duration;

use serde::Serialize;

use crate::pool::PoolStats;
use crate::scheduler::EventStatus;

/// Why an event loop stopped pulling events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[derive(strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StopReason {
    /// The requested number of events was pulled.
    MaxEvents,
    /// The event selector ran out of events.
    SelectorExhausted,
    /// A stop was requested.
    StopRequested,
    /// The failed-event threshold was reached.
    FailureThreshold,
}

/// Event counts and timing of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Events that finished.
    pub processed: u64,
    /// Events with status [`EventStatus::Success`].
    pub succeeded: u64,
    /// Events with status [`EventStatus::AlgFail`].
    pub failed: u64,
    /// Events with status [`EventStatus::AlgStall`].
    pub stalled: u64,
    /// Events with status [`EventStatus::Aborted`].
    pub aborted: u64,
    /// Events with status [`EventStatus::Other`].
    pub other: u64,
    /// Why the run stopped pulling events.
    pub stop_reason: StopReason,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
    /// Algorithm pool counters at the end of the run.
    pub pool: PoolStats,
}

impl RunSummary {
    pub(crate) fn new(stop_reason: StopReason) -> Self {
        Self {
            processed: 0,
            succeeded: 0,
            failed: 0,
            stalled: 0,
            aborted: 0,
            other: 0,
            stop_reason,
            elapsed: Duration::ZERO,
            pool: PoolStats::default(),
        }
    }

    pub(crate) fn record(&mut self, status: EventStatus) {
        self.processed += 1;
        match status {
            EventStatus::Success => self.succeeded += 1,
            EventStatus::AlgFail => self.failed += 1,
            EventStatus::AlgStall => self.stalled += 1,
            EventStatus::Aborted => self.aborted += 1,
            EventStatus::Other => self.other += 1,
        }
    }

    /// Number of events with the given status.
    pub fn count(&self, status: EventStatus) -> u64 {
        match status {
            EventStatus::Success => self.succeeded,
            EventStatus::AlgFail => self.failed,
            EventStatus::AlgStall => self.stalled,
            EventStatus::Aborted => self.aborted,
            EventStatus::Other => self.other,
        }
    }

    /// Events counted against the failure threshold.
    pub fn failed_events(&self) -> u64 {
        self.failed + self.stalled
    }
}
