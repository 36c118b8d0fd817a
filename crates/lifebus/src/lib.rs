//! lifebus - a lifecycle-aware event bus.
//!
//! This is the umbrella crate: it re-exports the public API of `lifebus-core`
//! and adds one process-wide default bus, reachable through free functions.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lifebus::{Lifecycle, LifecycleEvent, observer_fn};
//!
//! #[derive(Debug)]
//! struct LoggedIn {
//!     user: String,
//! }
//!
//! let screen = Arc::new(Lifecycle::new());
//! screen.handle_event(LifecycleEvent::Create);
//!
//! let greeter = observer_fn(|event: &LoggedIn| println!("welcome, {}", event.user));
//! lifebus::register(&screen, &greeter);
//!
//! lifebus::publish(LoggedIn { user: "ada".into() });
//!
//! // Destroying the screen revokes the registration.
//! screen.destroy();
//! assert!(!lifebus::default_bus().is_registered(&greeter));
//! ```
//!
//! # Configuring the Default Bus
//!
//! The default bus is created lazily with [`BusConfig::default`] and no
//! scheduler. Call [`init`] once, before anything else touches it, to give it
//! an affinity thread or a different panic policy:
//!
//! ```no_run
//! use lifebus::{AffinityThread, EventBus};
//!
//! let main = AffinityThread::spawn()?;
//! lifebus::init(EventBus::builder().scheduler(main.handle()))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::any::Any;
use std::sync::{Arc, OnceLock};

pub use lifebus_core::*;

pub mod prelude;

static DEFAULT_BUS: OnceLock<EventBus> = OnceLock::new();

/// Initialize the default bus from `builder`.
///
/// Returns [`BusError::AlreadyInitialized`] if the default bus already exists,
/// whether from an earlier `init` or from lazy creation on first use.
pub fn init(builder: BusBuilder) -> Result<&'static EventBus> {
    let mut created = false;
    let bus = DEFAULT_BUS.get_or_init(|| {
        created = true;
        builder.build()
    });
    if created {
        tracing::debug!(
            target: logging::targets::CORE,
            bus = %bus.config().name,
            "default bus initialized"
        );
        Ok(bus)
    } else {
        Err(BusError::AlreadyInitialized)
    }
}

/// Get the default bus, creating it with default settings on first use.
pub fn default_bus() -> &'static EventBus {
    DEFAULT_BUS.get_or_init(EventBus::new)
}

/// Register `observer` on the default bus for as long as `owner` lives.
///
/// See [`EventBus::register_with`].
pub fn register<E, L, O>(owner: &Arc<L>, observer: &Arc<O>)
where
    E: Any + Send + Sync,
    L: LifecycleOwner + 'static,
    O: Observer<E> + ?Sized,
{
    default_bus().register(owner, observer);
}

/// Register `observer` on the default bus for as long as `owner` lives, with an
/// explicit thread affinity.
pub fn register_with<E, L, O>(owner: &Arc<L>, observer: &Arc<O>, affinity: ThreadAffinity)
where
    E: Any + Send + Sync,
    L: LifecycleOwner + 'static,
    O: Observer<E> + ?Sized,
{
    default_bus().register_with(owner, observer, affinity);
}

/// Register `observer` on the default bus until it is removed.
pub fn register_permanent<E, O>(observer: &Arc<O>)
where
    E: Any + Send + Sync,
    O: Observer<E> + ?Sized,
{
    default_bus().register_permanent(observer);
}

/// Register `observer` on the default bus until it is removed, with an
/// explicit thread affinity.
pub fn register_permanent_with<E, O>(observer: &Arc<O>, affinity: ThreadAffinity)
where
    E: Any + Send + Sync,
    O: Observer<E> + ?Sized,
{
    default_bus().register_permanent_with(observer, affinity);
}

/// Publish `event` on the default bus.
pub fn publish<E: Any + Send + Sync>(event: E) {
    default_bus().publish(event);
}

/// Publish a type-erased event on the default bus.
pub fn publish_any(event: Arc<dyn Any + Send + Sync>) {
    default_bus().publish_any(event);
}

/// Remove every registration of `observer` from the default bus.
pub fn remove<O: ?Sized>(observer: &Arc<O>) {
    default_bus().remove(observer);
}

/// Drop every registration on the default bus.
///
/// Only meant for tests sharing the process-wide bus.
pub fn reset_for_testing() {
    default_bus().reset_for_testing();
}
