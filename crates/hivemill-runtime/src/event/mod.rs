//! Event-level collaborators: event contexts, incidents, abort handling and
//! event selectors.

mod abort;
mod context;
mod incident;
mod selector;

pub use abort::AbortBridge;
pub use context::EventContext;
pub use incident::{Incident, IncidentBus, IncidentListener};
pub use selector::{EventSelector, Selection, SelectorContext, SelectorError};
