//! Binding registrations to an owner's lifecycle.
//!
//! A [`LifecycleBridge`] is the listener the bus attaches to an owner for one
//! bound registration. When the owner reports its terminal state the bridge
//! removes the observer from the bus and unsubscribes itself, so neither the
//! registration nor the bridge outlives the owner.
//!
//! The bridge only holds weak references: it never keeps the owner or the
//! bus alive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use crate::lifecycle::{LifecycleListener, LifecycleOwner, LifecycleState, ListenerId};
use crate::logging::targets;
use crate::observer::ObserverId;

/// The bus-side operation a bridge triggers on its owner's terminal state.
pub(crate) trait Unregister: Send + Sync {
    /// Remove every registration of `observer`.
    fn unregister(&self, observer: ObserverId);
}

/// Lifecycle listener that revokes one bound registration.
pub(crate) struct LifecycleBridge {
    owner: Weak<dyn LifecycleOwner>,
    registry: Weak<dyn Unregister>,
    observer: ObserverId,
    /// Set once `attach` got an ID back from the owner.
    listener: OnceLock<ListenerId>,
    detached: AtomicBool,
}

impl LifecycleBridge {
    pub(crate) fn new(
        owner: Weak<dyn LifecycleOwner>,
        registry: Weak<dyn Unregister>,
        observer: ObserverId,
    ) -> Arc<Self> {
        Arc::new(Self {
            owner,
            registry,
            observer,
            listener: OnceLock::new(),
            detached: AtomicBool::new(false),
        })
    }

    /// Subscribe to the owner's lifecycle.
    ///
    /// Returns `false` if the owner is already gone or destroyed, in which case
    /// no terminal notification will ever arrive and the caller must drop the
    /// registration itself.
    pub(crate) fn attach(self: &Arc<Self>) -> bool {
        let Some(owner) = self.owner.upgrade() else {
            self.disarm();
            return false;
        };

        let id = owner.add_listener(self.clone());
        let _ = self.listener.set(id);

        // Detached concurrently before the ID was known, or destroyed before
        // the listener went in.
        if self.is_detached() || owner.current_state().is_terminal() {
            self.disarm();
            owner.remove_listener(id);
            return false;
        }
        true
    }

    /// Unsubscribe from the owner. Idempotent.
    pub(crate) fn detach(&self) {
        if self.detached.swap(true, Ordering::AcqRel) {
            return;
        }
        if let (Some(owner), Some(id)) = (self.owner.upgrade(), self.listener.get()) {
            owner.remove_listener(*id);
        }
    }

    /// Stop reacting to the owner without unsubscribing from it.
    pub(crate) fn disarm(&self) {
        self.detached.store(true, Ordering::Release);
    }

    pub(crate) fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Check if the owner can still notify us.
    pub(crate) fn owner_alive(&self) -> bool {
        self.owner.strong_count() > 0
    }
}

impl LifecycleListener for LifecycleBridge {
    fn on_state_changed(&self, state: LifecycleState) {
        if !state.is_terminal() || self.is_detached() {
            return;
        }

        tracing::debug!(
            target: targets::LIFECYCLE,
            observer = %self.observer,
            "owner destroyed, removing observer"
        );
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.observer);
        }
        self.detach();
    }
}
