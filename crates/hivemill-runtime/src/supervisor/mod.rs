//! Event supervisor.
//!
//! The [`EventLoop`] owns the slots, pulls events from an
//! [`EventSelector`](crate::event::EventSelector), pushes them into the
//! [`Scheduler`](crate::scheduler::Scheduler) and frees slots as events
//! finish, until a termination condition is met.

mod event_loop;
mod stop;
mod summary;

pub use event_loop::EventLoop;
pub use stop::StopHandle;
pub use summary::{RunSummary, StopReason};

/// Lifecycle state of an [`EventLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum LoopState {
    /// Algorithms are resolved; no instance exists yet.
    #[default]
    Configured,
    /// Algorithm instances are created and initialized.
    Initialized,
    /// Ready to process events.
    Started,
    /// Event processing ended; may be started again.
    Stopped,
    /// Algorithm instances are finalized and dropped.
    Finalized,
}

/// Occupancy state of a slot as seen by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(strum::Display, strum::AsRefStr)]
pub enum SlotState {
    /// Available for a new event.
    #[default]
    Free,
    /// The store is being prepared for a new event.
    Loading,
    /// The scheduler is working on the event.
    Processing,
    /// The event finished and its slot is being released.
    Draining,
}
