//! Transient data store of one slot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{DataObject, EventAddress, StoreError};
use crate::flow::DataKey;

/// Key under which the payload of the event address is installed.
pub const ROOT_KEY: &str = "/Event";

#[derive(Default)]
struct StoreInner {
    event: Option<u64>,
    root: Option<EventAddress>,
    objects: HashMap<DataKey, DataObject>,
    new_objects: Vec<DataKey>,
}

/// Working memory of the event occupying one slot.
///
/// Each slot owns a separate store with its own lock, so algorithms working on
/// different events never contend with each other.
pub struct EventStore {
    slot: usize,
    inner: Mutex<StoreInner>,
}

impl EventStore {
    pub(crate) fn new(slot: usize) -> Self {
        Self {
            slot,
            inner: Mutex::new(StoreInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the slot index this store belongs to.
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Returns the number of the event occupying the slot.
    pub fn event(&self) -> Option<u64> {
        self.lock().event
    }

    /// Claims the store for an event. Fails if it is already occupied.
    pub(crate) fn try_claim(&self, event: u64) -> bool {
        let mut inner = self.lock();
        if inner.event.is_some() {
            return false;
        }
        inner.event = Some(event);
        true
    }

    pub(crate) fn release(&self) {
        self.lock().event = None;
    }

    /// Clears the store and installs the root of a new event.
    ///
    /// A payload carried by the address is registered under [`ROOT_KEY`].
    pub fn set_root(&self, address: Option<EventAddress>) {
        let mut inner = self.lock();
        inner.objects.clear();
        inner.new_objects.clear();
        if let Some(payload) = address.as_ref().and_then(EventAddress::payload_object) {
            inner.objects.insert(DataKey::from(ROOT_KEY), Arc::clone(payload));
        }
        inner.root = address;
    }

    /// Returns the address of the current event.
    pub fn root(&self) -> Option<EventAddress> {
        self.lock().root.clone()
    }

    /// Erases every object and the root.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.objects.clear();
        inner.new_objects.clear();
        inner.root = None;
    }

    /// Registers a data object.
    pub fn register<T>(&self, key: impl Into<DataKey>, value: T) -> Result<(), StoreError>
    where
        T: Send + Sync + 'static,
    {
        self.register_object(key, Arc::new(value))
    }

    /// Registers a type-erased data object.
    pub fn register_object(
        &self,
        key: impl Into<DataKey>,
        object: DataObject,
    ) -> Result<(), StoreError> {
        let key = key.into();
        let mut inner = self.lock();
        if inner.objects.contains_key(&key) {
            return Err(StoreError::AlreadyRegistered(key));
        }
        inner.objects.insert(key.clone(), object);
        inner.new_objects.push(key);
        Ok(())
    }

    /// Retrieves a data object of type `T`.
    pub fn retrieve<T>(&self, key: &str) -> Result<Arc<T>, StoreError>
    where
        T: Send + Sync + 'static,
    {
        let object = self
            .retrieve_object(key)
            .ok_or_else(|| StoreError::NotFound(DataKey::from(key)))?;
        object
            .downcast::<T>()
            .map_err(|_| StoreError::TypeMismatch(DataKey::from(key)))
    }

    /// Retrieves a type-erased data object.
    pub fn retrieve_object(&self, key: &str) -> Option<DataObject> {
        self.lock().objects.get(key).cloned()
    }

    /// Returns whether a data object exists.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().objects.contains_key(key)
    }

    /// Number of data objects.
    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    /// Returns `true` if the store holds no object.
    pub fn is_empty(&self) -> bool {
        self.lock().objects.is_empty()
    }

    /// Returns the keys registered since the last call.
    pub fn take_new_objects(&self) -> Vec<DataKey> {
        std::mem::take(&mut self.lock().new_objects)
    }
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("EventStore")
            .field("slot", &self.slot)
            .field("event", &inner.event)
            .field("objects", &inner.objects.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_retrieve() {
        let store = EventStore::new(0);
        store.register("/Event/Hits", vec![1u32, 2, 3]).unwrap();

        let hits = store.retrieve::<Vec<u32>>("/Event/Hits").unwrap();
        assert_eq!(*hits, vec![1, 2, 3]);
        assert!(matches!(
            store.retrieve::<String>("/Event/Hits"),
            Err(StoreError::TypeMismatch(_))
        ));
        assert!(matches!(
            store.retrieve::<u32>("/Event/None"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_register_twice_fails() {
        let store = EventStore::new(0);
        store.register("k", 1u8).unwrap();
        assert_eq!(
            store.register("k", 2u8),
            Err(StoreError::AlreadyRegistered(DataKey::from("k")))
        );
    }

    #[test]
    fn test_set_root_clears_previous_event() {
        let store = EventStore::new(3);
        store.register("k", 1u8).unwrap();

        store.set_root(Some(EventAddress::new("evt-2").with_payload(7u64)));

        assert!(!store.contains("k"));
        assert_eq!(*store.retrieve::<u64>(ROOT_KEY).unwrap(), 7);
        assert_eq!(store.root().unwrap().location(), "evt-2");
        assert!(store.take_new_objects().is_empty());
    }

    #[test]
    fn test_new_objects_are_drained() {
        let store = EventStore::new(0);
        store.register("a", ()).unwrap();
        store.register("b", ()).unwrap();

        assert_eq!(store.take_new_objects().len(), 2);
        assert!(store.take_new_objects().is_empty());
        assert_eq!(store.len(), 2);
    }
}
