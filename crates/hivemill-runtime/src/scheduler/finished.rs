//! Finished-event queue.

use std::time::Duration;

use tokio::sync::mpsc;

use super::{AlgorithmFailure, EventStatus};
use crate::event::EventContext;
use crate::flow::DataMask;

/// An event whose slot reached [`SlotPhase::Done`](super::SlotPhase::Done).
#[derive(Debug, Clone)]
pub struct FinishedEvent {
    /// The event and its slot.
    pub context: EventContext,
    /// Final status.
    pub status: EventStatus,
    /// Keys produced by the event.
    pub produced: DataMask,
    /// Algorithms that ran to completion, successfully or not.
    pub completed: DataMask,
    /// Algorithm failures, in completion order.
    pub failures: Vec<AlgorithmFailure>,
    /// Time between scheduling and the last completion.
    pub elapsed: Duration,
}

/// Receiving end of the scheduler's finished-event queue.
#[derive(Debug)]
pub struct FinishedEvents {
    rx: mpsc::UnboundedReceiver<FinishedEvent>,
}

impl FinishedEvents {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<FinishedEvent>) -> Self {
        Self { rx }
    }

    /// Waits for the next finished event.
    ///
    /// Returns `None` once the scheduler is dropped and the queue is empty.
    pub async fn pop(&mut self) -> Option<FinishedEvent> {
        self.rx.recv().await
    }

    /// Returns a finished event if one is queued.
    pub fn try_pop(&mut self) -> Option<FinishedEvent> {
        self.rx.try_recv().ok()
    }
}
