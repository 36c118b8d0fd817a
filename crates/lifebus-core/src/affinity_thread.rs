//! A dedicated thread acting as the affinity thread.
//!
//! Hosts that already own a UI thread should drive a [`MainLoop`] on it. For
//! headless services and tests, [`AffinityThread`] spawns a named thread that
//! runs a loop until stopped, so `Main` deliveries have somewhere to go.
//!
//! # Example
//!
//! ```
//! use lifebus_core::{AffinityThread, EventBus, ThreadAffinity, observer_fn};
//!
//! let main = AffinityThread::spawn().unwrap();
//! let bus = EventBus::builder().scheduler(main.handle()).build();
//!
//! let main_id = main.thread_id();
//! let observer = observer_fn(move |_: &u32| {
//!     assert_eq!(std::thread::current().id(), main_id);
//! });
//! bus.register_permanent_with(&observer, ThreadAffinity::Main);
//! bus.publish(7u32);
//!
//! main.flush().unwrap();
//! main.stop_and_join();
//! ```

use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::bounded;
use parking_lot::Mutex;

use crate::error::SchedulerError;
use crate::logging::targets;
use crate::main_loop::{MainLoop, MainLoopHandle};
use crate::scheduler::{Scheduler, Task};

/// Default name for the affinity thread.
const DEFAULT_THREAD_NAME: &str = "lifebus-main";

/// Configuration for spawning an [`AffinityThread`].
#[derive(Debug, Clone)]
pub struct AffinityThreadConfig {
    /// Name for the thread.
    pub name: String,
    /// Stack size for the thread in bytes. `None` uses the default.
    pub stack_size: Option<usize>,
}

impl Default for AffinityThreadConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_THREAD_NAME.to_string(),
            stack_size: None,
        }
    }
}

impl AffinityThreadConfig {
    /// Create a new configuration with the given thread name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Builder for spawning an [`AffinityThread`] with custom configuration.
#[derive(Debug, Default)]
pub struct AffinityThreadBuilder {
    config: AffinityThreadConfig,
}

impl AffinityThreadBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the thread name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the stack size for the thread.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Spawn the thread.
    pub fn spawn(self) -> Result<AffinityThread, SchedulerError> {
        AffinityThread::with_config(self.config)
    }
}

/// A spawned thread that runs a [`MainLoop`] until stopped.
///
/// Dropping it requests a stop without waiting for the thread to exit.
pub struct AffinityThread {
    handle: MainLoopHandle,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl AffinityThread {
    /// Spawn an affinity thread with default configuration.
    pub fn spawn() -> Result<Self, SchedulerError> {
        Self::with_config(AffinityThreadConfig::default())
    }

    /// Spawn an affinity thread with custom configuration.
    pub fn with_config(config: AffinityThreadConfig) -> Result<Self, SchedulerError> {
        let (handle_sender, handle_receiver) = bounded(1);

        let mut builder = thread::Builder::new().name(config.name.clone());
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let join_handle = builder.spawn(move || {
            let main_loop = MainLoop::new();
            if handle_sender.send(main_loop.handle()).is_err() {
                return;
            }
            if let Err(err) = main_loop.run() {
                tracing::error!(target: targets::MAIN_LOOP, %err, "affinity thread loop failed");
            }
        })?;

        let handle = handle_receiver.recv().map_err(|_| SchedulerError::Closed)?;
        tracing::debug!(target: targets::MAIN_LOOP, name = %config.name, "affinity thread started");

        Ok(Self {
            handle,
            join_handle: Mutex::new(Some(join_handle)),
        })
    }

    /// Create a builder for custom configuration.
    pub fn builder() -> AffinityThreadBuilder {
        AffinityThreadBuilder::new()
    }

    /// Get a cloneable scheduler handle for this thread.
    pub fn handle(&self) -> MainLoopHandle {
        self.handle.clone()
    }

    /// The ID of the spawned thread.
    pub fn thread_id(&self) -> ThreadId {
        self.handle.thread().thread_id()
    }

    /// Check if the thread is still running.
    pub fn is_running(&self) -> bool {
        self.join_handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Get the number of tasks waiting to run.
    pub fn pending_tasks(&self) -> usize {
        self.handle.pending_count()
    }

    /// Block until every task posted before this call has run.
    ///
    /// Fails with [`SchedulerError::Reentrant`] when called from the affinity
    /// thread itself, and with [`SchedulerError::Closed`] once it has stopped.
    pub fn flush(&self) -> Result<(), SchedulerError> {
        if self.handle.is_affinity_thread() {
            return Err(SchedulerError::Reentrant);
        }

        let (done_sender, done_receiver) = bounded(1);
        self.handle.post(Box::new(move || {
            let _ = done_sender.send(());
        }))?;
        done_receiver.recv().map_err(|_| SchedulerError::Closed)
    }

    /// Request the thread to stop after running the tasks already queued.
    ///
    /// Non-blocking; use [`join`](Self::join) to wait for the exit.
    pub fn stop(&self) {
        self.handle.quit();
    }

    /// Wait for the thread to finish.
    ///
    /// Returns `true` if the thread was joined successfully, `false` if it was
    /// already joined or a task panicked on it.
    pub fn join(&self) -> bool {
        let handle = self.join_handle.lock().take();
        match handle {
            Some(handle) => handle.join().is_ok(),
            None => false,
        }
    }

    /// Stop the thread and wait for it to finish.
    pub fn stop_and_join(&self) -> bool {
        self.stop();
        self.join()
    }
}

impl Scheduler for AffinityThread {
    fn is_affinity_thread(&self) -> bool {
        self.handle.is_affinity_thread()
    }

    fn post(&self, task: Task) -> Result<(), SchedulerError> {
        self.handle.post(task)
    }
}

impl Drop for AffinityThread {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_spawn_and_stop() {
        let main = AffinityThread::spawn().unwrap();
        assert!(main.is_running());
        assert_ne!(main.thread_id(), thread::current().id());
        assert!(main.stop_and_join());
        assert!(!main.join());
    }

    #[test]
    fn test_builder_names_thread() {
        let main = AffinityThread::builder()
            .name("test-affinity")
            .stack_size(256 * 1024)
            .spawn()
            .unwrap();

        let name = Arc::new(parking_lot::Mutex::new(None));
        let name_clone = name.clone();
        main.post(Box::new(move || {
            *name_clone.lock() = thread::current().name().map(str::to_string);
        }))
        .unwrap();
        main.flush().unwrap();

        assert_eq!(name.lock().as_deref(), Some("test-affinity"));
        main.stop_and_join();
    }

    #[test]
    fn test_tasks_run_on_affinity_thread_in_order() {
        let main = AffinityThread::spawn().unwrap();
        let main_id = main.thread_id();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for i in 0..20 {
            let order_clone = order.clone();
            main.post(Box::new(move || {
                assert_eq!(thread::current().id(), main_id);
                order_clone.lock().push(i);
            }))
            .unwrap();
        }
        main.flush().unwrap();

        assert_eq!(*order.lock(), (0..20).collect::<Vec<_>>());
        main.stop_and_join();
    }

    #[test]
    fn test_stop_drains_queued_tasks() {
        let main = AffinityThread::spawn().unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let count_clone = count.clone();
            main.post(Box::new(move || {
                thread::sleep(std::time::Duration::from_millis(5));
                count_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }
        main.stop_and_join();

        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_post_after_stop() {
        let main = AffinityThread::spawn().unwrap();
        main.stop_and_join();

        assert!(matches!(
            main.post(Box::new(|| {})),
            Err(SchedulerError::Closed)
        ));
        assert!(matches!(main.flush(), Err(SchedulerError::Closed)));
    }

    #[test]
    fn test_flush_from_affinity_thread_is_rejected() {
        let main = Arc::new(AffinityThread::spawn().unwrap());
        let result = Arc::new(parking_lot::Mutex::new(None));

        let main_clone = main.clone();
        let result_clone = result.clone();
        main.post(Box::new(move || {
            *result_clone.lock() = Some(matches!(
                main_clone.flush(),
                Err(SchedulerError::Reentrant)
            ));
        }))
        .unwrap();
        main.flush().unwrap();

        assert_eq!(*result.lock(), Some(true));
        main.stop_and_join();
    }
}
