//! Prelude module for lifebus.
//!
//! Re-exports the most commonly used types:
//!
//! ```
//! use lifebus::prelude::*;
//! ```

// ============================================================================
// Bus
// ============================================================================

pub use crate::{BusBuilder, EventBus, PanicPolicy};

// ============================================================================
// Observers
// ============================================================================

pub use crate::{Observer, ObserverId, ThreadAffinity, observer_fn};

// ============================================================================
// Lifecycles
// ============================================================================

pub use crate::{Lifecycle, LifecycleEvent, LifecycleOwner, LifecycleState};

// ============================================================================
// Schedulers
// ============================================================================

pub use crate::{AffinityThread, MainLoop, Scheduler};
