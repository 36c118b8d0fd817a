//! Core of lifebus, a lifecycle-aware event bus.
//!
//! This crate provides:
//!
//! - **Event Bus**: type-routed publish/subscribe with exact-type matching
//! - **Lifecycle Binding**: registrations revoked automatically when their
//!   owner is destroyed
//! - **Thread Affinity**: per-observer choice between the publishing thread and
//!   a designated affinity thread
//! - **Schedulers**: a host-driven main loop and a dedicated affinity thread
//! - **Lifecycle**: a ready-made, thread-safe lifecycle owner
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lifebus_core::{
//!     AffinityThread, EventBus, Lifecycle, LifecycleEvent, ThreadAffinity, observer_fn,
//! };
//!
//! #[derive(Debug)]
//! struct Downloaded(String);
//!
//! let main = AffinityThread::spawn().unwrap();
//! let bus = EventBus::builder().scheduler(main.handle()).build();
//!
//! let screen = Arc::new(Lifecycle::new());
//! screen.handle_event(LifecycleEvent::Create);
//!
//! let label = observer_fn(|event: &Downloaded| println!("show {}", event.0));
//! bus.register_with(&screen, &label, ThreadAffinity::Main);
//!
//! bus.publish(Downloaded("report.pdf".into()));
//! main.flush().unwrap();
//!
//! // The screen goes away, and so does its registration.
//! screen.destroy();
//! assert!(!bus.is_registered(&label));
//! ```
//!
//! # Threading Model
//!
//! Every operation may be called from any thread. `Origin` observers run on the
//! publishing thread before `publish` returns. `Main` observers run inline when
//! published from the affinity thread and are otherwise posted to the bus's
//! [`Scheduler`] without waiting.

mod affinity_thread;
mod bridge;
mod bus;
mod config;
mod dispatcher;
mod error;
mod handle;
mod lifecycle;
pub mod logging;
mod main_loop;
mod observer;
mod registry;
mod scheduler;
pub mod thread_check;

pub use affinity_thread::{AffinityThread, AffinityThreadBuilder, AffinityThreadConfig};
pub use bus::EventBus;
pub use config::{BusBuilder, BusConfig, PanicPolicy};
pub use dispatcher::{Dispatched, ThreadDispatcher};
pub use error::{BusError, Result, SchedulerError};
pub use lifecycle::{
    Lifecycle, LifecycleEvent, LifecycleListener, LifecycleOwner, LifecycleState, ListenerId,
};
pub use logging::{DebugFormatOptions, RegistryDebug, TreeStyle};
pub use main_loop::{MainLoop, MainLoopHandle};
pub use observer::{EventType, FnObserver, Observer, ObserverId, ThreadAffinity, observer_fn};
pub use scheduler::{ImmediateScheduler, Scheduler, Task};
