//! Error types for lifebus.
//!
//! The bus itself has almost no failure modes: duplicate registrations and
//! removals of unknown observers are silent no-ops. Errors only surface at the
//! edges, where the bus talks to a scheduler or where the process-wide default
//! bus is configured.

use std::thread::ThreadId;

use thiserror::Error;

/// The main error type for lifebus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// The process-wide default bus has already been created.
    #[error("the default event bus has already been initialized")]
    AlreadyInitialized,
    /// Scheduler-related error.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// Errors raised by affinity-thread schedulers.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The receiving side of the task queue is gone; the task was dropped.
    #[error("the affinity thread's task queue is closed")]
    Closed,
    /// A loop was driven from a thread other than the one it is bound to.
    #[error("main loop bound to thread {expected:?} was driven from thread {actual:?}")]
    WrongThread {
        /// The thread the loop belongs to.
        expected: ThreadId,
        /// The thread that tried to drive it.
        actual: ThreadId,
    },
    /// A blocking wait was requested from the affinity thread itself.
    #[error("cannot wait for the affinity thread from the affinity thread")]
    Reentrant,
    /// The dedicated affinity thread could not be started.
    #[error("failed to spawn affinity thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// A specialized Result type for lifebus operations.
pub type Result<T> = std::result::Result<T, BusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_error_converts_into_bus_error() {
        let err: BusError = SchedulerError::Closed.into();
        assert!(matches!(err, BusError::Scheduler(SchedulerError::Closed)));
        assert_eq!(
            err.to_string(),
            "scheduler error: the affinity thread's task queue is closed"
        );
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error as _;

        let err = BusError::Scheduler(SchedulerError::Closed);
        assert!(err.source().is_some());
        assert!(BusError::AlreadyInitialized.source().is_none());
    }
}
