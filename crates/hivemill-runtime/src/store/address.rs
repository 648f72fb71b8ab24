//! Opaque event addresses.

use std::fmt;
use std::sync::Arc;

use super::DataObject;

/// Address of an event, as produced by an event selector.
///
/// The location is a human-readable identifier (file offset, record number,
/// ...). The optional payload is installed as the root object of the event
/// store when the event is loaded.
#[derive(Clone)]
pub struct EventAddress {
    location: String,
    payload: Option<DataObject>,
}

impl EventAddress {
    /// Creates an address without payload.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            payload: None,
        }
    }

    /// Attaches a payload to the address.
    pub fn with_payload<T: Send + Sync + 'static>(mut self, payload: T) -> Self {
        self.payload = Some(Arc::new(payload));
        self
    }

    /// Returns the location.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Returns the payload if it has type `T`.
    pub fn payload<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.payload.clone()?.downcast::<T>().ok()
    }

    pub(crate) fn payload_object(&self) -> Option<&DataObject> {
        self.payload.as_ref()
    }
}

impl fmt::Debug for EventAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventAddress")
            .field("location", &self.location)
            .field("payload", &self.payload.is_some())
            .finish()
    }
}

impl fmt::Display for EventAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location)
    }
}
