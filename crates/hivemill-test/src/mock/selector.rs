//! In-memory event selectors.

use hivemill_runtime::event::{EventSelector, Selection, SelectorContext, SelectorError};
use hivemill_runtime::store::EventAddress;

/// Position of an in-memory selector.
#[derive(Debug, Default)]
struct Cursor {
    /// Number of `next` calls that returned an event.
    read: usize,
}

fn cursor(context: &SelectorContext) -> Result<&Cursor, SelectorError> {
    context
        .downcast_ref::<Cursor>()
        .ok_or_else(SelectorError::invalid_context)
}

fn cursor_mut(context: &mut SelectorContext) -> Result<&mut Cursor, SelectorError> {
    context
        .downcast_mut::<Cursor>()
        .ok_or_else(SelectorError::invalid_context)
}

/// Yields `total` events whose address payload is the event index (`u64`).
#[derive(Debug, Clone)]
pub struct CountingSelector {
    total: usize,
}

impl CountingSelector {
    /// Creates a selector yielding `total` events.
    pub fn new(total: usize) -> Self {
        Self { total }
    }
}

impl EventSelector for CountingSelector {
    fn create_context(&mut self) -> Result<SelectorContext, SelectorError> {
        Ok(Box::new(Cursor::default()))
    }

    fn next(&mut self, context: &mut SelectorContext) -> Result<Selection, SelectorError> {
        let cursor = cursor_mut(context)?;
        if cursor.read >= self.total {
            return Ok(Selection::Exhausted);
        }
        cursor.read += 1;
        Ok(Selection::Available)
    }

    fn create_address(
        &mut self,
        context: &SelectorContext,
    ) -> Result<Option<EventAddress>, SelectorError> {
        let index = cursor(context)?.read.saturating_sub(1);
        Ok(Some(
            EventAddress::new(format!("counting:{index}")).with_payload(index as u64),
        ))
    }
}

/// Yields a fixed list of addresses; `None` entries fail address creation.
#[derive(Debug, Clone)]
pub struct VecSelector {
    addresses: Vec<Option<EventAddress>>,
}

impl VecSelector {
    /// Creates a selector over the given addresses.
    pub fn new(addresses: impl IntoIterator<Item = Option<EventAddress>>) -> Self {
        Self {
            addresses: addresses.into_iter().collect(),
        }
    }

    /// Creates a selector whose addresses carry the given payloads.
    pub fn from_payloads<T>(payloads: impl IntoIterator<Item = T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self::new(
            payloads
                .into_iter()
                .enumerate()
                .map(|(i, payload)| Some(EventAddress::new(format!("vec:{i}")).with_payload(payload))),
        )
    }
}

impl EventSelector for VecSelector {
    fn create_context(&mut self) -> Result<SelectorContext, SelectorError> {
        Ok(Box::new(Cursor::default()))
    }

    fn next(&mut self, context: &mut SelectorContext) -> Result<Selection, SelectorError> {
        let cursor = cursor_mut(context)?;
        if cursor.read >= self.addresses.len() {
            return Ok(Selection::Exhausted);
        }
        cursor.read += 1;
        Ok(Selection::Available)
    }

    fn create_address(
        &mut self,
        context: &SelectorContext,
    ) -> Result<Option<EventAddress>, SelectorError> {
        let index = cursor(context)?.read.saturating_sub(1);
        Ok(self.addresses.get(index).cloned().flatten())
    }
}
