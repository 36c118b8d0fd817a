//! Owner lifecycles.
//!
//! Registrations on an [`EventBus`](crate::EventBus) can be bound to an owner:
//! any component that implements [`LifecycleOwner`]. The bus attaches a
//! [`LifecycleListener`] to the owner and drops the registration once the owner
//! reports [`LifecycleState::Destroyed`].
//!
//! The trait is deliberately narrow so hosts can adapt their own component
//! model. [`Lifecycle`] is a ready-made, thread-safe implementation that
//! components can embed and drive with [`LifecycleEvent`]s.
//!
//! # State Machine
//!
//! ```text
//!  Initialized ─Create─► Created ─Start─► Started ─Resume─► Resumed
//!                          ▲  │             ▲  │              │
//!                          │  │             │  └────Pause─────┘
//!                          └──┼────Stop─────┘
//!                             └─Destroy─► Destroyed (final)
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lifebus_core::{Lifecycle, LifecycleEvent, LifecycleOwner, LifecycleState};
//!
//! let lifecycle = Arc::new(Lifecycle::new());
//! lifecycle.handle_event(LifecycleEvent::Create);
//! assert_eq!(lifecycle.current_state(), LifecycleState::Created);
//!
//! lifecycle.handle_event(LifecycleEvent::Destroy);
//! assert!(lifecycle.current_state().is_terminal());
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a listener attached to a [`LifecycleOwner`].
    pub struct ListenerId;
}

/// The state of an owner's lifecycle.
///
/// States are ordered so that `state >= LifecycleState::Started` reads as
/// "at least started"; `Destroyed` sorts lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    /// The owner is gone. Final; reached at most once.
    Destroyed,
    /// Constructed, not yet created.
    Initialized,
    /// Created, or stopped after having been started.
    Created,
    /// Started, or paused after having been resumed.
    Started,
    /// Fully active.
    Resumed,
}

impl LifecycleState {
    /// Check if this is the final state.
    #[inline]
    pub fn is_terminal(self) -> bool {
        self == Self::Destroyed
    }

    /// Check if this state is at least `other`.
    #[inline]
    pub fn is_at_least(self, other: Self) -> bool {
        self >= other
    }
}

/// A lifecycle transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Move to [`LifecycleState::Created`].
    Create,
    /// Move to [`LifecycleState::Started`].
    Start,
    /// Move to [`LifecycleState::Resumed`].
    Resume,
    /// Move back down to [`LifecycleState::Started`].
    Pause,
    /// Move back down to [`LifecycleState::Created`].
    Stop,
    /// Move to [`LifecycleState::Destroyed`].
    Destroy,
}

impl LifecycleEvent {
    /// The state this event moves the lifecycle into.
    pub fn target_state(self) -> LifecycleState {
        match self {
            Self::Create | Self::Stop => LifecycleState::Created,
            Self::Start | Self::Pause => LifecycleState::Started,
            Self::Resume => LifecycleState::Resumed,
            Self::Destroy => LifecycleState::Destroyed,
        }
    }
}

/// Receives a notification on every state transition of an owner.
pub trait LifecycleListener: Send + Sync {
    /// Called after the owner moved into `state`.
    fn on_state_changed(&self, state: LifecycleState);
}

/// A component whose lifecycle registrations can be bound to.
///
/// Implementations must reach [`LifecycleState::Destroyed`] at most once and
/// never leave it. Listeners may call [`remove_listener`](Self::remove_listener)
/// from inside [`LifecycleListener::on_state_changed`], so implementations must
/// not hold internal locks while notifying.
pub trait LifecycleOwner: Send + Sync {
    /// The owner's current state.
    fn current_state(&self) -> LifecycleState;

    /// Attach a listener notified on every subsequent transition.
    fn add_listener(&self, listener: Arc<dyn LifecycleListener>) -> ListenerId;

    /// Detach a listener. Returns `false` if it was not attached.
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// A thread-safe lifecycle registry.
///
/// Embed it in a component, or share it directly as an `Arc<Lifecycle>` owner.
pub struct Lifecycle {
    state: Mutex<LifecycleState>,
    listeners: Mutex<SlotMap<ListenerId, Arc<dyn LifecycleListener>>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Create a lifecycle in [`LifecycleState::Initialized`].
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LifecycleState::Initialized),
            listeners: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Apply a transition and notify listeners.
    ///
    /// Returns `true` if the state changed. Events after `Destroyed` are
    /// ignored and nobody is notified; so are events that target the current
    /// state.
    pub fn handle_event(&self, event: LifecycleEvent) -> bool {
        let target = event.target_state();
        {
            let mut state = self.state.lock();
            if state.is_terminal() {
                tracing::warn!(
                    target: targets::LIFECYCLE,
                    ?event,
                    "lifecycle already destroyed, ignoring event"
                );
                return false;
            }
            if *state == target {
                return false;
            }
            tracing::trace!(
                target: targets::LIFECYCLE,
                from = ?*state,
                to = ?target,
                "lifecycle transition"
            );
            *state = target;
        }

        // Listeners may detach themselves while being notified.
        let listeners: Vec<_> = self.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener.on_state_changed(target);
        }
        true
    }

    /// Shorthand for `handle_event(LifecycleEvent::Destroy)`.
    pub fn destroy(&self) -> bool {
        self.handle_event(LifecycleEvent::Destroy)
    }

    /// Get the number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl LifecycleOwner for Lifecycle {
    fn current_state(&self) -> LifecycleState {
        *self.state.lock()
    }

    fn add_listener(&self, listener: Arc<dyn LifecycleListener>) -> ListenerId {
        self.listeners.lock().insert(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.lock().remove(id).is_some()
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("state", &self.current_state())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
