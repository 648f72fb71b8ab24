//! Prelude module for convenient imports.
//!
//! This module re-exports commonly used types for ergonomic imports:
//!
//! ```rust
//! use hivemill_runtime::prelude::*;
//! ```

pub use crate::algorithm::{
    Algorithm, AlgorithmError, AlgorithmFactory, AlgorithmId, AlgorithmSpec, Concurrency,
};
pub use crate::event::{
    EventContext, EventSelector, Incident, IncidentBus, IncidentListener, Selection,
    SelectorContext, SelectorError,
};
pub use crate::flow::{DataFlow, DataKey, DataMask, DependencyResolver};
pub use crate::pool::{AlgorithmPool, PoolStats};
pub use crate::scheduler::{EventStatus, FinishedEvent, Scheduler};
pub use crate::store::{EventAddress, EventStore, StoreError, Whiteboard};
pub use crate::supervisor::{EventLoop, LoopState, RunSummary, StopHandle, StopReason};
pub use crate::{Error, EventLoopConfig, Result, SchedulerConfig};
