//! Concurrent storage of registrations.
//!
//! The registry maps each [`EventType`] to the handles registered for it,
//! keyed by [`ObserverId`]. A single `RwLock` guards the whole map; it is held
//! only to insert, remove, or copy out a snapshot of `Arc` handles, never
//! while observer code runs. Publishing works on the snapshot, so observers
//! are free to register and remove (themselves included) while being notified.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::handle::ObserverHandle;
use crate::observer::{EventType, ObserverId};

type HandleSet = HashMap<ObserverId, Arc<ObserverHandle>>;

/// Map from event type to the handles registered for it.
#[derive(Default)]
pub(crate) struct EventRegistry {
    observers: RwLock<HashMap<EventType, HandleSet>>,
}

impl EventRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert `handle` unless its observer is already registered for its
    /// event type. Returns `true` if inserted.
    pub(crate) fn insert(&self, handle: Arc<ObserverHandle>) -> bool {
        let mut observers = self.observers.write();
        let set = observers.entry(handle.event_type()).or_default();
        match set.entry(handle.observer_id()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(handle);
                true
            }
        }
    }

    /// Remove every handle of `observer`, across all event types.
    pub(crate) fn remove_observer(&self, observer: ObserverId) -> Vec<Arc<ObserverHandle>> {
        let mut observers = self.observers.write();
        let mut removed = Vec::new();
        observers.retain(|_, set| {
            if let Some(handle) = set.remove(&observer) {
                removed.push(handle);
            }
            !set.is_empty()
        });
        removed
    }

    /// Remove exactly `handle`, leaving any other registration alone.
    pub(crate) fn remove_handle(&self, handle: &Arc<ObserverHandle>) -> bool {
        let mut observers = self.observers.write();
        let Some(set) = observers.get_mut(&handle.event_type()) else {
            return false;
        };
        let is_same = set
            .get(&handle.observer_id())
            .is_some_and(|current| Arc::ptr_eq(current, handle));
        if is_same {
            set.remove(&handle.observer_id());
            if set.is_empty() {
                observers.remove(&handle.event_type());
            }
        }
        is_same
    }

    /// Copy out the handles registered for `event_type`.
    pub(crate) fn snapshot(&self, event_type: EventType) -> Vec<Arc<ObserverHandle>> {
        self.observers
            .read()
            .get(&event_type)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove and return every handle.
    pub(crate) fn drain(&self) -> Vec<Arc<ObserverHandle>> {
        let drained = std::mem::take(&mut *self.observers.write());
        drained.into_values().flat_map(HashMap::into_values).collect()
    }

    pub(crate) fn observer_count(&self, event_type: EventType) -> usize {
        self.observers
            .read()
            .get(&event_type)
            .map_or(0, HashMap::len)
    }

    pub(crate) fn total(&self) -> usize {
        self.observers.read().values().map(HashMap::len).sum()
    }

    pub(crate) fn event_types(&self) -> Vec<EventType> {
        self.observers.read().keys().copied().collect()
    }

    pub(crate) fn contains_observer(&self, observer: ObserverId) -> bool {
        self.observers
            .read()
            .values()
            .any(|set| set.contains_key(&observer))
    }

    /// Copy out every event type with its handles.
    pub(crate) fn entries(&self) -> Vec<(EventType, Vec<Arc<ObserverHandle>>)> {
        self.observers
            .read()
            .iter()
            .map(|(event_type, set)| (*event_type, set.values().cloned().collect()))
            .collect()
    }
}
