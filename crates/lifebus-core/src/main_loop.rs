//! Host-driven FIFO queue for the affinity thread.
//!
//! A [`MainLoop`] is created on the thread that will drive it, typically the
//! host's UI thread. Other threads post tasks through a cloneable
//! [`MainLoopHandle`], which is a [`Scheduler`]; the host drains the queue by
//! calling [`MainLoop::run_pending`] from its own event loop, or hands the
//! thread over entirely with [`MainLoop::run`].
//!
//! ```
//! use lifebus_core::{MainLoop, Scheduler};
//!
//! let main_loop = MainLoop::new();
//! let handle = main_loop.handle();
//!
//! std::thread::spawn(move || {
//!     assert!(!handle.is_affinity_thread());
//!     handle.post(Box::new(|| println!("runs on the main loop"))).unwrap();
//! })
//! .join()
//! .unwrap();
//!
//! assert_eq!(main_loop.run_pending().unwrap(), 1);
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::error::SchedulerError;
use crate::logging::targets;
use crate::scheduler::{Scheduler, Task};
use crate::thread_check::BoundThread;

/// A message sent to the loop.
enum LoopMessage {
    /// Execute a posted task.
    Run(Task),
    /// Wake a blocked `run()` so it notices a quit request.
    Wake,
}

/// State shared between the loop and its handles.
struct LoopShared {
    /// Tasks posted but not yet executed.
    pending: AtomicUsize,
    /// Set by `quit()`, consumed by `run()`.
    quit_requested: AtomicBool,
}

/// A FIFO task queue bound to the thread that created it.
pub struct MainLoop {
    receiver: Receiver<LoopMessage>,
    handle: MainLoopHandle,
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl MainLoop {
    /// Create a loop bound to the calling thread.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            receiver,
            handle: MainLoopHandle {
                sender,
                thread: BoundThread::current(),
                shared: Arc::new(LoopShared {
                    pending: AtomicUsize::new(0),
                    quit_requested: AtomicBool::new(false),
                }),
            },
        }
    }

    /// Get a handle for posting tasks from any thread.
    pub fn handle(&self) -> MainLoopHandle {
        self.handle.clone()
    }

    /// The thread this loop is bound to.
    pub fn thread(&self) -> BoundThread {
        self.handle.thread
    }

    /// Get the number of tasks waiting to run.
    pub fn pending_count(&self) -> usize {
        self.handle.pending_count()
    }

    /// Run every task queued at the time of the call, in FIFO order.
    ///
    /// Tasks posted while draining are left for the next call. Returns the
    /// number of tasks executed.
    pub fn run_pending(&self) -> Result<usize, SchedulerError> {
        self.handle.thread.check()?;

        let queued = self.receiver.len();
        let mut processed = 0;
        for _ in 0..queued {
            match self.receiver.try_recv() {
                Ok(LoopMessage::Run(task)) => {
                    self.execute(task);
                    processed += 1;
                }
                Ok(LoopMessage::Wake) => {}
                Err(_) => break,
            }
        }

        if processed > 0 {
            tracing::trace!(target: targets::MAIN_LOOP, processed, "drained main loop");
        }
        Ok(processed)
    }

    /// Block the bound thread, running tasks as they arrive until
    /// [`MainLoopHandle::quit`] is called.
    ///
    /// Tasks already queued when the quit request is observed still run.
    /// Returns the total number of tasks executed.
    pub fn run(&self) -> Result<usize, SchedulerError> {
        self.handle.thread.check()?;
        tracing::debug!(target: targets::MAIN_LOOP, "main loop started");

        let mut processed = 0;
        loop {
            if self.handle.shared.quit_requested.swap(false, Ordering::AcqRel) {
                break;
            }
            match self.receiver.recv() {
                Ok(LoopMessage::Run(task)) => {
                    self.execute(task);
                    processed += 1;
                }
                Ok(LoopMessage::Wake) => {}
                Err(_) => break,
            }
        }

        processed += self.run_pending()?;
        tracing::debug!(target: targets::MAIN_LOOP, processed, "main loop stopped");
        Ok(processed)
    }

    /// Run one task. A panicking task is logged and does not stop the loop.
    fn execute(&self, task: Task) {
        self.handle.shared.pending.fetch_sub(1, Ordering::AcqRel);
        if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
            let message = payload
                .downcast_ref::<&'static str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("<non-string panic payload>");
            tracing::error!(target: targets::MAIN_LOOP, panic = message, "task panicked");
        }
    }
}

/// A cloneable, thread-safe handle to a [`MainLoop`].
#[derive(Clone)]
pub struct MainLoopHandle {
    sender: Sender<LoopMessage>,
    thread: BoundThread,
    shared: Arc<LoopShared>,
}

impl MainLoopHandle {
    /// The thread the loop is bound to.
    pub fn thread(&self) -> BoundThread {
        self.thread
    }

    /// Get the number of tasks waiting to run.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Ask a running [`MainLoop::run`] to return after draining its queue.
    pub fn quit(&self) {
        self.shared.quit_requested.store(true, Ordering::Release);
        let _ = self.sender.send(LoopMessage::Wake);
    }
}

impl Scheduler for MainLoopHandle {
    fn is_affinity_thread(&self) -> bool {
        self.thread.is_current()
    }

    fn post(&self, task: Task) -> Result<(), SchedulerError> {
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        self.sender.send(LoopMessage::Run(task)).map_err(|_| {
            self.shared.pending.fetch_sub(1, Ordering::AcqRel);
            SchedulerError::Closed
        })
    }
}

impl std::fmt::Debug for MainLoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainLoopHandle")
            .field("thread", &self.thread)
            .field("pending", &self.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::thread;

    #[test]
    fn test_post_and_run_pending() {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order_clone = order.clone();
            handle
                .post(Box::new(move || order_clone.lock().push(i)))
                .unwrap();
        }
        assert_eq!(main_loop.pending_count(), 5);

        assert_eq!(main_loop.run_pending().unwrap(), 5);
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(main_loop.pending_count(), 0);
    }

    #[test]
    fn test_run_pending_leaves_tasks_posted_while_draining() {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();
        let count = Arc::new(AtomicUsize::new(0));

        let inner_handle = handle.clone();
        let count_clone = count.clone();
        handle
            .post(Box::new(move || {
                let count_inner = count_clone.clone();
                count_clone.fetch_add(1, Ordering::SeqCst);
                inner_handle
                    .post(Box::new(move || {
                        count_inner.fetch_add(1, Ordering::SeqCst);
                    }))
                    .unwrap();
            }))
            .unwrap();

        assert_eq!(main_loop.run_pending().unwrap(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(main_loop.run_pending().unwrap(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_run_pending_from_wrong_thread() {
        let main_loop = Arc::new(MainLoop::new());
        let main_loop_clone = main_loop.clone();

        let result = thread::spawn(move || main_loop_clone.run_pending())
            .join()
            .unwrap();
        assert!(matches!(result, Err(SchedulerError::WrongThread { .. })));
    }

    #[test]
    fn test_panicking_task_does_not_stop_draining() {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();
        let count = Arc::new(AtomicUsize::new(0));

        fn failing_task() {
            panic!("task failure");
        }

        handle.post(Box::new(failing_task)).unwrap();
        let count_clone = count.clone();
        handle
            .post(Box::new(move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        assert_eq!(main_loop.run_pending().unwrap(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(main_loop.pending_count(), 0);
    }

    #[test]
    fn test_is_affinity_thread() {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();
        assert!(handle.is_affinity_thread());

        let remote = handle.clone();
        let on_affinity = thread::spawn(move || remote.is_affinity_thread())
            .join()
            .unwrap();
        assert!(!on_affinity);
    }

    #[test]
    fn test_post_after_loop_dropped() {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();
        drop(main_loop);

        let result = handle.post(Box::new(|| {}));
        assert!(matches!(result, Err(SchedulerError::Closed)));
        assert_eq!(handle.pending_count(), 0);
    }

    #[test]
    fn test_run_until_quit() {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();
        let count = Arc::new(AtomicUsize::new(0));

        let poster = {
            let handle = handle.clone();
            let count = count.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    let count = count.clone();
                    handle
                        .post(Box::new(move || {
                            count.fetch_add(1, Ordering::SeqCst);
                        }))
                        .unwrap();
                }
                handle.quit();
            })
        };

        let processed = main_loop.run().unwrap();
        poster.join().unwrap();

        assert_eq!(processed, 10);
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }
}
