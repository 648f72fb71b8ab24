//! Multi-slot whiteboard.

use std::sync::Arc;

use super::{EventAddress, EventStore};
use crate::error::{Error, Result};
use crate::flow::DataKey;

/// Tracing target for whiteboard operations.
const TRACING_TARGET: &str = "hivemill_runtime::store";

/// Fixed set of independent event stores, one per slot.
///
/// Every slot has its own [`EventStore`] instance; no two slots share
/// storage. Occupancy is tracked per store, so claiming and releasing a slot
/// never locks another slot.
#[derive(Debug)]
pub struct Whiteboard {
    stores: Vec<Arc<EventStore>>,
}

impl Whiteboard {
    /// Creates a whiteboard with `slots` empty stores.
    pub fn new(slots: usize) -> Self {
        let stores = (0..slots).map(|slot| Arc::new(EventStore::new(slot))).collect();
        tracing::debug!(target: TRACING_TARGET, slots, "Whiteboard created");
        Self { stores }
    }

    /// Number of slots.
    #[inline]
    pub fn slots(&self) -> usize {
        self.stores.len()
    }

    /// Returns the store of a slot.
    pub fn select_slot(&self, slot: usize) -> Result<Arc<EventStore>> {
        self.stores
            .get(slot)
            .cloned()
            .ok_or(Error::InvalidSlot {
                slot,
                slots: self.stores.len(),
            })
    }

    fn store(&self, slot: usize) -> Result<&EventStore> {
        self.stores
            .get(slot)
            .map(|store| &**store)
            .ok_or(Error::InvalidSlot {
                slot,
                slots: self.stores.len(),
            })
    }

    /// Erases all contents of a slot.
    pub fn clear_slot(&self, slot: usize) -> Result<()> {
        self.store(slot)?.clear();
        Ok(())
    }

    /// Clears a slot and installs the root of its new event.
    pub fn set_root(&self, slot: usize, address: Option<EventAddress>) -> Result<()> {
        self.store(slot)?.set_root(address);
        Ok(())
    }

    /// Claims the first free slot for an event.
    pub fn allocate_store(&self, event: u64) -> Option<usize> {
        let slot = self.stores.iter().position(|store| store.try_claim(event))?;
        tracing::trace!(target: TRACING_TARGET, slot, event, "Slot allocated");
        Some(slot)
    }

    /// Returns a slot to the free pool.
    pub fn free_store(&self, slot: usize) -> Result<()> {
        self.store(slot)?.release();
        tracing::trace!(target: TRACING_TARGET, slot, "Slot freed");
        Ok(())
    }

    /// Number of slots not holding an event.
    pub fn free_slots(&self) -> usize {
        self.stores
            .iter()
            .filter(|store| store.event().is_none())
            .count()
    }

    /// Returns the event held by a slot.
    pub fn event_in_slot(&self, slot: usize) -> Option<u64> {
        self.stores.get(slot).and_then(|store| store.event())
    }

    /// Returns the data objects registered in a slot since the last call.
    pub fn new_data_objects(&self, slot: usize) -> Result<Vec<DataKey>> {
        Ok(self.store(slot)?.take_new_objects())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_are_isolated() {
        let whiteboard = Whiteboard::new(2);
        let a = whiteboard.select_slot(0).unwrap();
        let b = whiteboard.select_slot(1).unwrap();

        a.register("k", 1u32).unwrap();
        b.register("k", 2u32).unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(*a.retrieve::<u32>("k").unwrap(), 1);
        assert_eq!(*b.retrieve::<u32>("k").unwrap(), 2);

        whiteboard.clear_slot(0).unwrap();
        assert!(a.is_empty());
        assert!(b.contains("k"));
    }

    #[test]
    fn test_allocate_and_free() {
        let whiteboard = Whiteboard::new(2);
        assert_eq!(whiteboard.allocate_store(10), Some(0));
        assert_eq!(whiteboard.allocate_store(11), Some(1));
        assert_eq!(whiteboard.allocate_store(12), None);
        assert_eq!(whiteboard.free_slots(), 0);
        assert_eq!(whiteboard.event_in_slot(1), Some(11));

        whiteboard.free_store(0).unwrap();
        assert_eq!(whiteboard.free_slots(), 1);
        assert_eq!(whiteboard.allocate_store(12), Some(0));
    }

    #[test]
    fn test_invalid_slot() {
        let whiteboard = Whiteboard::new(1);
        assert!(matches!(
            whiteboard.select_slot(4),
            Err(Error::InvalidSlot { slot: 4, slots: 1 })
        ));
        assert!(whiteboard.new_data_objects(1).is_err());
    }
}
