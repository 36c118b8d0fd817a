//! Thread binding for affinity-thread schedulers.
//!
//! A [`MainLoop`](crate::MainLoop) belongs to the thread that created it: only
//! that thread may drain its queue, and deliveries posted from that thread run
//! inline instead of being queued. [`BoundThread`] records that thread and
//! answers "am I on it?" cheaply from any thread.
//!
//! ```
//! use lifebus_core::thread_check::BoundThread;
//!
//! let bound = BoundThread::current();
//! assert!(bound.is_current());
//!
//! std::thread::spawn(move || {
//!     assert!(!bound.is_current());
//! })
//! .join()
//! .unwrap();
//! ```

use std::thread::ThreadId;

use crate::error::SchedulerError;

/// Identity of the thread a scheduler is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundThread {
    thread_id: ThreadId,
}

impl Default for BoundThread {
    fn default() -> Self {
        Self::current()
    }
}

impl BoundThread {
    /// Bind to the calling thread.
    #[inline]
    pub fn current() -> Self {
        Self {
            thread_id: std::thread::current().id(),
        }
    }

    /// Get the thread ID this binding refers to.
    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Check if the calling thread is the bound thread.
    #[inline]
    pub fn is_current(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    /// Fail with [`SchedulerError::WrongThread`] unless called on the bound thread.
    pub fn check(&self) -> Result<(), SchedulerError> {
        let actual = std::thread::current().id();
        if actual == self.thread_id {
            Ok(())
        } else {
            Err(SchedulerError::WrongThread {
                expected: self.thread_id,
                actual,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_bound_thread_same_thread() {
        let bound = BoundThread::current();
        assert!(bound.is_current());
        assert!(bound.check().is_ok());
    }

    #[test]
    fn test_bound_thread_different_thread() {
        let bound = BoundThread::current();
        let result = Arc::new(AtomicBool::new(false));

        let result_clone = result.clone();
        std::thread::spawn(move || {
            result_clone.store(!bound.is_current(), Ordering::SeqCst);
        })
        .join()
        .unwrap();

        assert!(
            result.load(Ordering::SeqCst),
            "is_current() should return false from a different thread"
        );
    }

    #[test]
    fn test_check_reports_both_threads() {
        let bound = BoundThread::current();
        let expected = bound.thread_id();

        let err = std::thread::spawn(move || bound.check())
            .join()
            .unwrap()
            .unwrap_err();

        match err {
            SchedulerError::WrongThread {
                expected: e,
                actual,
            } => {
                assert_eq!(e, expected);
                assert_ne!(actual, expected);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_binds_current_thread() {
        let bound = BoundThread::default();
        assert_eq!(bound.thread_id(), std::thread::current().id());
    }
}
