//! Bus configuration.

use std::sync::Arc;

use crate::bus::EventBus;
use crate::scheduler::{ImmediateScheduler, Scheduler};

/// Default bus name used in log output.
const DEFAULT_BUS_NAME: &str = "lifebus";

/// What happens when an observer panics during a publish.
///
/// Either way the remaining observers of that publish still run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PanicPolicy {
    /// Log each panic, then resume the first one on the publishing thread once
    /// every observer has been attempted. Queued `Main` deliveries have no
    /// publisher to resume on; their panics are logged on the affinity thread.
    #[default]
    Propagate,
    /// Log each panic and carry on, wherever the observer ran.
    Log,
}

/// Configuration for an [`EventBus`].
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Name reported in log output.
    pub name: String,
    /// How observer panics are handled.
    pub panic_policy: PanicPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_BUS_NAME.to_string(),
            panic_policy: PanicPolicy::default(),
        }
    }
}

impl BusConfig {
    /// Create a new configuration with the given name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Builder for creating an [`EventBus`] with custom configuration.
///
/// ```
/// use lifebus_core::{EventBus, MainLoop, PanicPolicy};
///
/// let main_loop = MainLoop::new();
/// let bus = EventBus::builder()
///     .name("ui")
///     .panic_policy(PanicPolicy::Log)
///     .scheduler(main_loop.handle())
///     .build();
/// assert_eq!(bus.config().name, "ui");
/// ```
#[derive(Default)]
pub struct BusBuilder {
    config: BusConfig,
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl BusBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the bus name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the panic policy.
    pub fn panic_policy(mut self, policy: PanicPolicy) -> Self {
        self.config.panic_policy = policy;
        self
    }

    /// Set the scheduler for `Main` deliveries.
    pub fn scheduler<S: Scheduler + 'static>(self, scheduler: S) -> Self {
        self.shared_scheduler(Arc::new(scheduler))
    }

    /// Set an already shared scheduler for `Main` deliveries.
    pub fn shared_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Build the bus. Without a scheduler, `Main` deliveries run inline.
    pub fn build(self) -> EventBus {
        let scheduler: Arc<dyn Scheduler> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(ImmediateScheduler),
        };
        EventBus::with_config(self.config, scheduler)
    }
}

impl std::fmt::Debug for BusBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusBuilder")
            .field("config", &self.config)
            .field("scheduler", &self.scheduler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BusConfig::default();
        assert_eq!(config.name, "lifebus");
        assert_eq!(config.panic_policy, PanicPolicy::Propagate);
    }

    #[test]
    fn test_builder_overrides() {
        let bus = BusBuilder::new()
            .config(BusConfig::with_name("first"))
            .name("second")
            .panic_policy(PanicPolicy::Log)
            .build();

        assert_eq!(bus.config().name, "second");
        assert_eq!(bus.config().panic_policy, PanicPolicy::Log);
    }
}
