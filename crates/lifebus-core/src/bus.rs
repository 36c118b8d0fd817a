//! The event bus.
//!
//! An [`EventBus`] routes published values to the observers registered for
//! their exact type. Registrations are either bound to a [`LifecycleOwner`],
//! in which case they are revoked automatically when the owner reaches its
//! terminal state, or permanent, in which case they last until [`remove`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use lifebus_core::{EventBus, Lifecycle, LifecycleEvent, observer_fn};
//!
//! #[derive(Debug)]
//! struct Refreshed(u32);
//!
//! let bus = EventBus::new();
//! let screen = Arc::new(Lifecycle::new());
//! screen.handle_event(LifecycleEvent::Create);
//!
//! let seen = Arc::new(AtomicUsize::new(0));
//! let seen_clone = seen.clone();
//! let observer = observer_fn(move |_: &Refreshed| {
//!     seen_clone.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! bus.register(&screen, &observer);
//! bus.publish(Refreshed(1));
//!
//! screen.destroy();
//! bus.publish(Refreshed(2));
//!
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! assert_eq!(bus.total_observers(), 0);
//! ```
//!
//! # Thread Safety
//!
//! `EventBus` is `Send + Sync` and cheap to clone; clones share one registry.
//! Any thread may register, remove, and publish concurrently. Observer code is
//! never called with an internal lock held, so observers may use the bus
//! re-entrantly.
//!
//! [`remove`]: EventBus::remove

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::{Arc, Weak};

use crate::bridge::{LifecycleBridge, Unregister};
use crate::config::{BusBuilder, BusConfig, PanicPolicy};
use crate::dispatcher::{Dispatched, ThreadDispatcher};
use crate::handle::ObserverHandle;
use crate::lifecycle::LifecycleOwner;
use crate::logging::targets;
use crate::observer::{EventType, Observer, ObserverId, ThreadAffinity};
use crate::registry::EventRegistry;
use crate::scheduler::{ImmediateScheduler, Scheduler};

/// State shared by every clone of a bus, and weakly by its bridges.
struct BusShared {
    registry: EventRegistry,
    dispatcher: ThreadDispatcher,
    config: BusConfig,
}

impl BusShared {
    fn remove_observer(&self, observer: ObserverId) -> usize {
        let removed = self.registry.remove_observer(observer);
        for handle in &removed {
            handle.detach();
        }
        if !removed.is_empty() {
            tracing::debug!(
                target: targets::REGISTRY,
                bus = %self.config.name,
                %observer,
                registrations = removed.len(),
                "observer removed"
            );
        }
        removed.len()
    }
}

impl Unregister for BusShared {
    fn unregister(&self, observer: ObserverId) {
        self.remove_observer(observer);
    }
}

/// A type-routed publish/subscribe bus with lifecycle-bound registrations.
#[derive(Clone)]
pub struct EventBus {
    shared: Arc<BusShared>,
}

static_assertions::assert_impl_all!(EventBus: Send, Sync);

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a bus with default configuration.
    ///
    /// Without a scheduler every thread counts as the affinity thread, so
    /// `Main` observers run inline like `Origin` ones.
    pub fn new() -> Self {
        Self::with_config(BusConfig::default(), Arc::new(ImmediateScheduler))
    }

    /// Create a builder for custom configuration.
    pub fn builder() -> BusBuilder {
        BusBuilder::new()
    }

    /// Create a bus posting `Main` deliveries to `scheduler`.
    pub fn with_config(config: BusConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        tracing::debug!(
            target: targets::CORE,
            bus = %config.name,
            panic_policy = ?config.panic_policy,
            "event bus created"
        );
        Self {
            shared: Arc::new(BusShared {
                registry: EventRegistry::new(),
                dispatcher: ThreadDispatcher::new(scheduler),
                config,
            }),
        }
    }

    /// The configuration this bus was built with.
    pub fn config(&self) -> &BusConfig {
        &self.shared.config
    }

    /// The dispatcher used for deliveries.
    pub fn dispatcher(&self) -> &ThreadDispatcher {
        &self.shared.dispatcher
    }

    pub(crate) fn registry(&self) -> &EventRegistry {
        &self.shared.registry
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register `observer` for events of type `E` for as long as `owner` lives,
    /// delivering on the publishing thread.
    ///
    /// See [`register_with`](Self::register_with).
    pub fn register<E, L, O>(&self, owner: &Arc<L>, observer: &Arc<O>)
    where
        E: Any + Send + Sync,
        L: LifecycleOwner + 'static,
        O: Observer<E> + ?Sized,
    {
        self.register_with(owner, observer, ThreadAffinity::Origin);
    }

    /// Register `observer` for events of type `E` for as long as `owner` lives.
    ///
    /// The registration is revoked when the owner reaches its terminal state,
    /// or when it is dropped without ever reaching it. The bus holds the owner
    /// weakly and never keeps it alive.
    ///
    /// Registering an observer already registered for `E` keeps the original
    /// registration. Registering against an owner that is already destroyed
    /// or dropped does nothing.
    pub fn register_with<E, L, O>(
        &self,
        owner: &Arc<L>,
        observer: &Arc<O>,
        affinity: ThreadAffinity,
    ) where
        E: Any + Send + Sync,
        L: LifecycleOwner + 'static,
        O: Observer<E> + ?Sized,
    {
        let owner = Arc::downgrade(owner);
        self.register_bound::<E, O>(owner, observer, affinity);
    }

    /// Register `observer` for events of type `E` until it is removed,
    /// delivering on the publishing thread.
    pub fn register_permanent<E, O>(&self, observer: &Arc<O>)
    where
        E: Any + Send + Sync,
        O: Observer<E> + ?Sized,
    {
        self.register_permanent_with(observer, ThreadAffinity::Origin);
    }

    /// Register `observer` for events of type `E` until it is removed.
    pub fn register_permanent_with<E, O>(&self, observer: &Arc<O>, affinity: ThreadAffinity)
    where
        E: Any + Send + Sync,
        O: Observer<E> + ?Sized,
    {
        let handle = Arc::new(ObserverHandle::new::<E, O>(observer, affinity, None));
        if self.shared.registry.insert(handle.clone()) {
            self.log_registered(&handle);
        } else {
            self.log_duplicate(&handle);
        }
    }

    fn register_bound<E, O>(
        &self,
        owner: Weak<dyn LifecycleOwner>,
        observer: &Arc<O>,
        affinity: ThreadAffinity,
    ) where
        E: Any + Send + Sync,
        O: Observer<E> + ?Sized,
    {
        let observer_id = ObserverId::of(observer);
        let alive = owner
            .upgrade()
            .is_some_and(|owner| !owner.current_state().is_terminal());
        if !alive {
            tracing::debug!(
                target: targets::REGISTRY,
                bus = %self.shared.config.name,
                observer = %observer_id,
                "owner already destroyed, registration ignored"
            );
            return;
        }

        let shared = Arc::downgrade(&self.shared);
        let registry: Weak<dyn Unregister> = shared;
        let bridge = LifecycleBridge::new(owner, registry, observer_id);
        let handle = Arc::new(ObserverHandle::new::<E, O>(
            observer,
            affinity,
            Some(bridge.clone()),
        ));

        if !self.shared.registry.insert(handle.clone()) {
            self.log_duplicate(&handle);
            return;
        }

        // Inserted before attaching so a terminal notification arriving right
        // after the attach always finds the handle to remove.
        if !bridge.attach() {
            self.shared.registry.remove_handle(&handle);
            handle.retire();
            tracing::debug!(
                target: targets::REGISTRY,
                bus = %self.shared.config.name,
                observer = %observer_id,
                "owner destroyed during registration"
            );
            return;
        }

        self.log_registered(&handle);
    }

    fn log_registered(&self, handle: &ObserverHandle) {
        tracing::debug!(
            target: targets::REGISTRY,
            bus = %self.shared.config.name,
            observer = %handle.observer_id(),
            event_type = %handle.event_type(),
            affinity = ?handle.affinity(),
            bound = handle.is_bound(),
            "observer registered"
        );
    }

    fn log_duplicate(&self, handle: &ObserverHandle) {
        tracing::trace!(
            target: targets::REGISTRY,
            bus = %self.shared.config.name,
            observer = %handle.observer_id(),
            event_type = %handle.event_type(),
            "observer already registered"
        );
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove every registration of `observer`, across all event types.
    ///
    /// Unknown observers are ignored. `Main` deliveries already queued for the
    /// observer still run.
    pub fn remove<O: ?Sized>(&self, observer: &Arc<O>) {
        self.remove_id(ObserverId::of(observer));
    }

    /// Remove every registration of the observer with the given ID.
    ///
    /// Returns the number of registrations removed.
    pub fn remove_id(&self, observer: ObserverId) -> usize {
        self.shared.remove_observer(observer)
    }

    /// Drop every registration.
    ///
    /// Owners are not unsubscribed from; their bridges are disarmed instead, so
    /// a later destroy cannot remove a newer registration of the same observer.
    pub fn clear(&self) {
        let drained = self.shared.registry.drain();
        for handle in &drained {
            handle.retire();
        }
        tracing::debug!(
            target: targets::REGISTRY,
            bus = %self.shared.config.name,
            registrations = drained.len(),
            "registry cleared"
        );
    }

    /// Drop every registration, returning the bus to a pristine state.
    pub fn reset_for_testing(&self) {
        self.clear();
    }

    // =========================================================================
    // Publishing
    // =========================================================================

    /// Deliver `event` to every observer registered for type `E`.
    ///
    /// Observers run in no particular order. `Origin` observers, and `Main`
    /// observers when called on the affinity thread, run before this returns;
    /// other `Main` observers are queued on the affinity thread.
    ///
    /// # Panics
    ///
    /// Under [`PanicPolicy::Propagate`], if an observer running on this thread
    /// panics, the panic is resumed once every other observer has been called.
    #[tracing::instrument(skip_all, target = "lifebus_core::dispatch", level = "trace")]
    pub fn publish<E: Any + Send + Sync>(&self, event: E) {
        self.dispatch(EventType::of::<E>(), Arc::new(event));
    }

    /// Deliver a type-erased event, routed by its dynamic type.
    ///
    /// # Panics
    ///
    /// See [`publish`](Self::publish).
    #[tracing::instrument(skip_all, target = "lifebus_core::dispatch", level = "trace")]
    pub fn publish_any(&self, event: Arc<dyn Any + Send + Sync>) {
        self.dispatch(EventType::of_val(&*event), event);
    }

    fn dispatch(&self, event_type: EventType, event: Arc<dyn Any + Send + Sync>) {
        let handles = self.shared.registry.snapshot(event_type);
        if handles.is_empty() {
            tracing::trace!(target: targets::DISPATCH, %event_type, "no observers");
            return;
        }
        tracing::trace!(
            target: targets::DISPATCH,
            %event_type,
            observers = handles.len(),
            "publishing event"
        );

        let dispatcher = &self.shared.dispatcher;
        let mut first_panic = None;

        for handle in handles {
            // Removed after the snapshot was taken.
            if !handle.is_active() {
                continue;
            }
            if handle.owner_dropped() {
                tracing::debug!(
                    target: targets::LIFECYCLE,
                    observer = %handle.observer_id(),
                    "owner dropped without being destroyed, removing observer"
                );
                self.remove_id(handle.observer_id());
                continue;
            }

            let delivery = handle.delivery(Arc::clone(&event));
            // A queued delivery has no publisher left to resume its panic on.
            let queued = handle.affinity() == ThreadAffinity::Main
                && !dispatcher.is_affinity_thread();
            let contain = queued || self.shared.config.panic_policy == PanicPolicy::Log;
            let outcome = if contain {
                let delivery = log_panics(&handle, delivery);
                catch_unwind(AssertUnwindSafe(|| {
                    dispatcher.run_with_affinity(handle.affinity(), delivery)
                }))
            } else {
                catch_unwind(AssertUnwindSafe(|| {
                    dispatcher.run_with_affinity(handle.affinity(), delivery)
                }))
            };

            match outcome {
                Ok(Dispatched::Inline) | Ok(Dispatched::Queued) => {}
                Ok(Dispatched::Dropped) => {
                    tracing::warn!(
                        target: targets::DISPATCH,
                        observer = %handle.observer_id(),
                        %event_type,
                        "delivery dropped"
                    );
                }
                Err(payload) => {
                    tracing::error!(
                        target: targets::DISPATCH,
                        observer = handle.observer_name(),
                        %event_type,
                        panic = panic_message(&*payload),
                        "observer panicked"
                    );
                    if first_panic.is_none() {
                        first_panic = Some(payload);
                    }
                }
            }
        }

        if let Some(payload) = first_panic {
            resume_unwind(payload);
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Get the number of observers registered for type `E`.
    pub fn observer_count<E: Any>(&self) -> usize {
        self.shared.registry.observer_count(EventType::of::<E>())
    }

    /// Get the number of registrations across all event types.
    pub fn total_observers(&self) -> usize {
        self.shared.registry.total()
    }

    /// Get the event types that currently have observers.
    pub fn event_types(&self) -> Vec<EventType> {
        self.shared.registry.event_types()
    }

    /// Check if `observer` is registered for any event type.
    pub fn is_registered<O: ?Sized>(&self, observer: &Arc<O>) -> bool {
        self.shared.registry.contains_observer(ObserverId::of(observer))
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("name", &self.shared.config.name)
            .field("panic_policy", &self.shared.config.panic_policy)
            .field("observers", &self.total_observers())
            .finish()
    }
}

/// Wrap `delivery` so a panic is logged where it happens instead of unwinding.
fn log_panics<F>(handle: &ObserverHandle, delivery: F) -> impl FnOnce() + Send + 'static + use<F>
where
    F: FnOnce() + Send + 'static,
{
    let observer = handle.observer_name();
    let event_type = handle.event_type();
    move || {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(delivery)) {
            tracing::error!(
                target: targets::DISPATCH,
                observer,
                %event_type,
                panic = panic_message(&*payload),
                "observer panicked"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}
