//! Event selector interface.

use std::any::Any;
use std::borrow::Cow;

use crate::store::EventAddress;

/// Opaque iteration state owned by an event selector.
pub type SelectorContext = Box<dyn Any + Send>;

/// Outcome of advancing a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The context points at a new event.
    Available,
    /// No more events; a normal end of input.
    Exhausted,
}

/// Source of events for the supervisor.
pub trait EventSelector: Send {
    /// Creates the iteration state for a run.
    fn create_context(&mut self) -> Result<SelectorContext, SelectorError>;

    /// Advances the context to the next event.
    fn next(&mut self, context: &mut SelectorContext) -> Result<Selection, SelectorError>;

    /// Creates the address of the event the context points at.
    ///
    /// `None` means the address could not be built for this event.
    fn create_address(
        &mut self,
        context: &SelectorContext,
    ) -> Result<Option<EventAddress>, SelectorError>;

    /// Releases the iteration state at the end of a run.
    fn release_context(&mut self, context: SelectorContext) -> Result<(), SelectorError> {
        drop(context);
        Ok(())
    }
}

/// Failure reported by an event selector.
#[derive(Debug, thiserror::Error)]
#[error("event selector failed: {message}")]
pub struct SelectorError {
    message: Cow<'static, str>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SelectorError {
    /// Creates an error with a message.
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error with a message and source.
    pub fn with_source(
        message: impl Into<Cow<'static, str>>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The context passed in was not created by this selector.
    pub fn invalid_context() -> Self {
        Self::new("context was not created by this selector")
    }
}
