//! The process-wide default bus.
//!
//! Every test shares the same bus, so each one uses its own event type and
//! never asserts on global counts.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use lifebus::prelude::*;
use lifebus::BusError;
use parking_lot::Mutex;

#[test]
fn init_after_first_use_is_rejected() {
    let _ = lifebus::default_bus();
    let result = lifebus::init(EventBus::builder().name("late"));
    assert!(matches!(result, Err(BusError::AlreadyInitialized)));
}

#[test]
fn default_bus_is_shared() {
    let first = lifebus::default_bus();
    let second = lifebus::default_bus();
    assert!(std::ptr::eq(first, second));
}

#[test]
fn bound_registration_through_free_functions() {
    struct Saved(u32);

    let owner = Arc::new(Lifecycle::new());
    owner.handle_event(LifecycleEvent::Create);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let seen_clone = seen.clone();
    let observer = observer_fn(move |event: &Saved| seen_clone.lock().push(event.0));
    lifebus::register(&owner, &observer);

    lifebus::publish(Saved(1));
    owner.destroy();
    lifebus::publish(Saved(2));

    assert_eq!(*seen.lock(), vec![1]);
}

#[test]
fn permanent_registration_through_free_functions() {
    struct Synced;

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = hits.clone();
    let observer = observer_fn(move |_: &Synced| {
        hits_clone.fetch_add(1, Ordering::SeqCst);
    });

    lifebus::register_permanent_with(&observer, ThreadAffinity::Main);
    lifebus::publish(Synced);
    lifebus::publish_any(Arc::new(Synced));
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    lifebus::remove(&observer);
    lifebus::publish(Synced);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(lifebus::default_bus().observer_count::<Synced>(), 0);
}
