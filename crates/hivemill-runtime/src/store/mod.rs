//! Per-event transient data stores.
//!
//! The [`Whiteboard`] owns one [`EventStore`] per slot. Algorithms only ever
//! see the store of the slot their event occupies.

mod address;
mod error;
mod event_store;
mod whiteboard;

use std::any::Any;
use std::sync::Arc;

pub use address::EventAddress;
pub use error::StoreError;
pub use event_store::{EventStore, ROOT_KEY};
pub use whiteboard::Whiteboard;

/// A type-erased data object held by an event store.
pub type DataObject = Arc<dyn Any + Send + Sync>;
