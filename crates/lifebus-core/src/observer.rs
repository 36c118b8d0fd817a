//! Observers and the keys the registry files them under.
//!
//! - [`EventType`] - routing key derived from the published value's type
//! - [`Observer<E>`] - the capability invoked for events of type `E`
//! - [`ObserverId`] - identity of a shared observer, used for removal and
//!   duplicate suppression
//! - [`ThreadAffinity`] - which thread an observer runs on
//!
//! Observers are shared as `Arc<O>`. Identity is the `Arc` allocation, never
//! the observer's value: two observers that behave identically are still two
//! registrations.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

/// The routing key of an event.
///
/// Compares and hashes by [`TypeId`] only; the name is kept for diagnostics.
/// Routing is by exact type: `EventType::of::<String>()` and
/// `EventType::of::<&'static str>()` never match each other.
#[derive(Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    /// The event type of `E`.
    pub fn of<E: Any>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
        }
    }

    /// The event type of a type-erased value.
    ///
    /// The name of an erased value is not recoverable; it reads `"<erased>"`.
    pub fn of_val(event: &(dyn Any + Send + Sync)) -> Self {
        Self {
            id: event.type_id(),
            name: "<erased>",
        }
    }

    /// The underlying type identifier.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The type's name, for diagnostics only.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Identity of a shared observer.
///
/// Derived from the address of the observer's `Arc` allocation. While a
/// registration holds the `Arc`, no other live observer can share the ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(usize);

impl ObserverId {
    /// The identity of `observer`.
    pub fn of<O: ?Sized>(observer: &Arc<O>) -> Self {
        Self(Arc::as_ptr(observer).cast::<()>() as usize)
    }

    /// Get the raw value of this ID.
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Which thread an observer's handler runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ThreadAffinity {
    /// Run on whichever thread published the event.
    #[default]
    Origin,
    /// Run on the designated affinity thread.
    ///
    /// Inline when the publisher is already on it, otherwise posted to the
    /// bus's [`Scheduler`](crate::Scheduler) without waiting.
    Main,
}

/// Handles events of type `E`.
///
/// A type may observe several event types by implementing `Observer<E>` more
/// than once; each registration names the type it is for.
///
/// ```
/// use lifebus_core::Observer;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// struct Counter(AtomicUsize);
///
/// impl Observer<u32> for Counter {
///     fn on_event(&self, event: &u32) {
///         self.0.fetch_add(*event as usize, Ordering::SeqCst);
///     }
/// }
/// ```
pub trait Observer<E>: Send + Sync + 'static {
    /// Handle one published event.
    fn on_event(&self, event: &E);
}

/// An [`Observer`] backed by a closure. Created with [`observer_fn`].
pub struct FnObserver<E, F> {
    handler: F,
    _event: PhantomData<fn(&E)>,
}

impl<E, F> Observer<E> for FnObserver<E, F>
where
    E: 'static,
    F: Fn(&E) + Send + Sync + 'static,
{
    fn on_event(&self, event: &E) {
        (self.handler)(event)
    }
}

impl<E, F> fmt::Debug for FnObserver<E, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObserver")
            .field("event", &std::any::type_name::<E>())
            .finish_non_exhaustive()
    }
}

/// Wrap a closure as a shareable observer.
///
/// Each call creates a distinct observer identity.
///
/// ```
/// use lifebus_core::{EventBus, observer_fn};
///
/// let bus = EventBus::new();
/// let observer = observer_fn(|text: &String| println!("got {text}"));
/// bus.register_permanent(&observer);
/// bus.publish("hello".to_string());
/// bus.remove(&observer);
/// ```
pub fn observer_fn<E, F>(handler: F) -> Arc<FnObserver<E, F>>
where
    E: 'static,
    F: Fn(&E) + Send + Sync + 'static,
{
    Arc::new(FnObserver {
        handler,
        _event: PhantomData,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_equality_ignores_name() {
        let typed = EventType::of::<String>();
        let erased = EventType::of_val(&String::from("x"));

        assert_eq!(typed, erased);
        assert!(typed.name().ends_with("String"));
        assert_eq!(erased.name(), "<erased>");
    }

    #[test]
    fn test_event_type_exact_match_only() {
        assert_ne!(EventType::of::<String>(), EventType::of::<&'static str>());
        assert_ne!(EventType::of::<i32>(), EventType::of::<i64>());
    }

    #[test]
    fn test_observer_identity() {
        let a = observer_fn(|_: &i32| {});
        let b = observer_fn(|_: &i32| {});
        let a_again = a.clone();

        assert_eq!(ObserverId::of(&a), ObserverId::of(&a_again));
        assert_ne!(ObserverId::of(&a), ObserverId::of(&b));
    }

    #[test]
    fn test_observer_identity_survives_unsizing() {
        let concrete = observer_fn(|_: &i32| {});
        let erased: Arc<dyn Observer<i32>> = concrete.clone();

        assert_eq!(ObserverId::of(&concrete), ObserverId::of(&erased));
    }

    #[test]
    fn test_fn_observer_invokes_closure() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let observer = observer_fn(move |value: &i32| seen_clone.lock().push(*value));

        observer.on_event(&1);
        observer.on_event(&2);

        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn test_default_affinity_is_origin() {
        assert_eq!(ThreadAffinity::default(), ThreadAffinity::Origin);
    }
}
