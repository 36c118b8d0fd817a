//! The affinity-thread scheduler seam.
//!
//! Observers registered with [`ThreadAffinity::Main`](crate::ThreadAffinity::Main)
//! must run on one designated thread, usually a UI thread owned by the host.
//! The bus never drives that thread itself; it only asks a [`Scheduler`]
//! whether the caller is already on it, and otherwise hands it a task.
//!
//! Shipped implementations:
//!
//! - [`ImmediateScheduler`] - every thread counts as the affinity thread.
//! - [`MainLoopHandle`](crate::MainLoopHandle) - a host-driven FIFO queue.
//! - [`AffinityThread`](crate::AffinityThread) - a dedicated thread running a loop.

use crate::error::SchedulerError;

/// A boxed task posted to the affinity thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A single designated executor for [`ThreadAffinity::Main`](crate::ThreadAffinity::Main)
/// deliveries.
///
/// Implementations must run posted tasks on the affinity thread in the order
/// they were posted.
pub trait Scheduler: Send + Sync {
    /// Check if the calling thread is the affinity thread.
    fn is_affinity_thread(&self) -> bool;

    /// Enqueue a task for later execution on the affinity thread.
    ///
    /// Must not wait for the task to run.
    fn post(&self, task: Task) -> Result<(), SchedulerError>;
}

/// A scheduler without a dedicated thread.
///
/// Every caller is treated as being on the affinity thread, so `Main`
/// deliveries run inline exactly like `Origin` ones. This is the default for
/// buses built without a scheduler, e.g. in tests or before a host loop exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
    fn is_affinity_thread(&self) -> bool {
        true
    }

    fn post(&self, task: Task) -> Result<(), SchedulerError> {
        task();
        Ok(())
    }
}
