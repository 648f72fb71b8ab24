//! Per-slot scheduling.
//!
//! Every event pushed into the [`Scheduler`] runs as its own task that owns
//! the [`SlotRun`] of its slot. Algorithm completions are posted back to that
//! task over a channel, so a slot's state is only ever touched by one task
//! and no lock spans more than one slot.

mod dispatch;
mod finished;
mod slot;
mod status;

pub use dispatch::Scheduler;
pub use finished::{FinishedEvent, FinishedEvents};
pub use slot::SlotRun;
pub use status::{AlgorithmFailure, EventStatus, SlotPhase};
