//! Thread-affinity dispatch.
//!
//! [`ThreadDispatcher`] decides, per delivery, whether a callback runs on the
//! calling thread or is handed to the bus's [`Scheduler`]:
//!
//! | Affinity | Caller on affinity thread | Result                  |
//! |----------|---------------------------|-------------------------|
//! | `Origin` | either                    | runs inline             |
//! | `Main`   | yes                       | runs inline             |
//! | `Main`   | no                        | posted, not waited for  |

use std::sync::Arc;

use crate::logging::targets;
use crate::observer::ThreadAffinity;
use crate::scheduler::Scheduler;

/// How a callback was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// Ran to completion on the calling thread.
    Inline,
    /// Posted to the affinity thread.
    Queued,
    /// The scheduler rejected the post; the callback was dropped.
    Dropped,
}

/// Runs callbacks according to their [`ThreadAffinity`].
#[derive(Clone)]
pub struct ThreadDispatcher {
    scheduler: Arc<dyn Scheduler>,
}

impl ThreadDispatcher {
    /// Create a dispatcher posting `Main` work to `scheduler`.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self { scheduler }
    }

    /// The scheduler `Main` work is posted to.
    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    /// Check if the calling thread is the affinity thread.
    pub fn is_affinity_thread(&self) -> bool {
        self.scheduler.is_affinity_thread()
    }

    /// Run `callback` on the thread its affinity asks for.
    ///
    /// Never waits for queued work. A callback the scheduler refuses is
    /// dropped with a warning.
    pub fn run_with_affinity<F>(&self, affinity: ThreadAffinity, callback: F) -> Dispatched
    where
        F: FnOnce() + Send + 'static,
    {
        match affinity {
            ThreadAffinity::Origin => {
                callback();
                Dispatched::Inline
            }
            ThreadAffinity::Main if self.scheduler.is_affinity_thread() => {
                callback();
                Dispatched::Inline
            }
            ThreadAffinity::Main => match self.scheduler.post(Box::new(callback)) {
                Ok(()) => Dispatched::Queued,
                Err(err) => {
                    tracing::warn!(
                        target: targets::DISPATCH,
                        %err,
                        "affinity thread unavailable, delivery dropped"
                    );
                    Dispatched::Dropped
                }
            },
        }
    }
}

impl std::fmt::Debug for ThreadDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadDispatcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main_loop::MainLoop;
    use crate::scheduler::ImmediateScheduler;
    use parking_lot::Mutex;
    use std::thread::{self, ThreadId};

    fn record_thread(
        slot: &Arc<Mutex<Option<ThreadId>>>,
    ) -> impl FnOnce() + Send + 'static + use<> {
        let slot = slot.clone();
        move || *slot.lock() = Some(thread::current().id())
    }

    #[test]
    fn test_origin_runs_on_caller() {
        let main_loop = MainLoop::new();
        let dispatcher = ThreadDispatcher::new(Arc::new(main_loop.handle()));
        let ran_on = Arc::new(Mutex::new(None));

        let ran_on_clone = ran_on.clone();
        let (mode, caller) = thread::spawn(move || {
            let mode =
                dispatcher.run_with_affinity(ThreadAffinity::Origin, record_thread(&ran_on_clone));
            (mode, thread::current().id())
        })
        .join()
        .unwrap();

        assert_eq!(mode, Dispatched::Inline);
        assert_eq!(*ran_on.lock(), Some(caller));
        assert_eq!(main_loop.pending_count(), 0);
    }

    #[test]
    fn test_main_from_affinity_thread_runs_inline() {
        let main_loop = MainLoop::new();
        let dispatcher = ThreadDispatcher::new(Arc::new(main_loop.handle()));
        let ran_on = Arc::new(Mutex::new(None));

        let mode = dispatcher.run_with_affinity(ThreadAffinity::Main, record_thread(&ran_on));

        assert_eq!(mode, Dispatched::Inline);
        assert_eq!(*ran_on.lock(), Some(thread::current().id()));
    }

    #[test]
    fn test_main_from_other_thread_is_queued() {
        let main_loop = MainLoop::new();
        let dispatcher = ThreadDispatcher::new(Arc::new(main_loop.handle()));
        let ran_on = Arc::new(Mutex::new(None));

        let ran_on_clone = ran_on.clone();
        let mode = thread::spawn(move || {
            dispatcher.run_with_affinity(ThreadAffinity::Main, record_thread(&ran_on_clone))
        })
        .join()
        .unwrap();

        assert_eq!(mode, Dispatched::Queued);
        assert!(ran_on.lock().is_none(), "queued work must not run before the loop drains");

        assert_eq!(main_loop.run_pending().unwrap(), 1);
        assert_eq!(*ran_on.lock(), Some(thread::current().id()));
    }

    #[test]
    fn test_main_with_closed_scheduler_is_dropped() {
        let main_loop = MainLoop::new();
        let dispatcher = ThreadDispatcher::new(Arc::new(main_loop.handle()));
        drop(main_loop);

        let mode = thread::spawn(move || dispatcher.run_with_affinity(ThreadAffinity::Main, || {}))
            .join()
            .unwrap();
        assert_eq!(mode, Dispatched::Dropped);
    }

    #[test]
    fn test_immediate_scheduler_runs_main_inline_anywhere() {
        let dispatcher = ThreadDispatcher::new(Arc::new(ImmediateScheduler));
        let mode = thread::spawn(move || dispatcher.run_with_affinity(ThreadAffinity::Main, || {}))
            .join()
            .unwrap();
        assert_eq!(mode, Dispatched::Inline);
    }
}
