//! Registry entries.

use std::any::{Any, type_name};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::bridge::LifecycleBridge;
use crate::logging::targets;
use crate::observer::{EventType, Observer, ObserverId, ThreadAffinity};

/// Type-erased call into an observer, gated by a downcast to its event type.
type Deliver = Arc<dyn Fn(&(dyn Any + Send + Sync)) + Send + Sync>;

/// One registration: an observer, its affinity, and optionally the bridge to
/// the owner it is bound to.
///
/// Immutable apart from the one-way `ACTIVE -> DETACHED` transition.
pub(crate) struct ObserverHandle {
    observer: ObserverId,
    observer_name: &'static str,
    event_type: EventType,
    affinity: ThreadAffinity,
    deliver: Deliver,
    bridge: Option<Arc<LifecycleBridge>>,
    active: AtomicBool,
}

impl ObserverHandle {
    pub(crate) fn new<E, O>(
        observer: &Arc<O>,
        affinity: ThreadAffinity,
        bridge: Option<Arc<LifecycleBridge>>,
    ) -> Self
    where
        E: Any + Send + Sync,
        O: Observer<E> + ?Sized,
    {
        let target = Arc::clone(observer);
        let deliver: Deliver = Arc::new(move |event: &(dyn Any + Send + Sync)| {
            match event.downcast_ref::<E>() {
                Some(event) => target.on_event(event),
                None => tracing::warn!(
                    target: targets::DISPATCH,
                    expected = type_name::<E>(),
                    "event type mismatch, delivery skipped"
                ),
            }
        });

        Self {
            observer: ObserverId::of(observer),
            observer_name: type_name::<O>(),
            event_type: EventType::of::<E>(),
            affinity,
            deliver,
            bridge,
            active: AtomicBool::new(true),
        }
    }

    pub(crate) fn observer_id(&self) -> ObserverId {
        self.observer
    }

    pub(crate) fn observer_name(&self) -> &'static str {
        self.observer_name
    }

    pub(crate) fn event_type(&self) -> EventType {
        self.event_type
    }

    pub(crate) fn affinity(&self) -> ThreadAffinity {
        self.affinity
    }

    pub(crate) fn bridge(&self) -> Option<&Arc<LifecycleBridge>> {
        self.bridge.as_ref()
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.bridge.is_some()
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Check if the handle is bound to an owner that was dropped without
    /// reaching its terminal state.
    pub(crate) fn owner_dropped(&self) -> bool {
        self.bridge
            .as_ref()
            .is_some_and(|bridge| !bridge.owner_alive())
    }

    /// Build the callback that delivers `event` to this observer.
    pub(crate) fn delivery(
        &self,
        event: Arc<dyn Any + Send + Sync>,
    ) -> impl FnOnce() + Send + 'static + use<> {
        let deliver = Arc::clone(&self.deliver);
        move || deliver(&*event)
    }

    /// `ACTIVE -> DETACHED`, unsubscribing from the owner if bound.
    ///
    /// Returns `false` if the handle was already detached.
    pub(crate) fn detach(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        if let Some(bridge) = &self.bridge {
            bridge.detach();
        }
        true
    }

    /// `ACTIVE -> DETACHED` without touching the owner.
    pub(crate) fn retire(&self) {
        self.active.store(false, Ordering::Release);
        if let Some(bridge) = &self.bridge {
            bridge.disarm();
        }
    }
}

impl std::fmt::Debug for ObserverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverHandle")
            .field("observer", &self.observer)
            .field("event_type", &self.event_type)
            .field("affinity", &self.affinity)
            .field("bound", &self.is_bound())
            .field("active", &self.is_active())
            .finish()
    }
}
