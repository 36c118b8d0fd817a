//! Logging and debugging facilities.
//!
//! # Tracing Integration
//!
//! lifebus is instrumented with the `tracing` crate. To see its output, install
//! a subscriber in the host application and filter by the [`targets`] below:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("lifebus_core::registry=debug,lifebus_core::dispatch=trace")
//!     .init();
//! ```
//!
//! Registration and removal log at `debug`, publishing at `trace`, dropped
//! deliveries and ignored lifecycle events at `warn`, and observer panics at
//! `error`.
//!
//! # Debug Visualization
//!
//! [`RegistryDebug`] renders the registrations of a bus as a tree:
//!
//! ```
//! use lifebus_core::{EventBus, RegistryDebug, observer_fn};
//!
//! let bus = EventBus::new();
//! let observer = observer_fn(|_: &u32| {});
//! bus.register_permanent(&observer);
//!
//! let tree = RegistryDebug::new(&bus).format();
//! assert!(tree.contains("u32"));
//! ```

use std::fmt::{self, Write as FmtWrite};

use crate::bus::EventBus;
use crate::observer::ThreadAffinity;

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core target.
    pub const CORE: &str = "lifebus_core";
    /// Registration and removal.
    pub const REGISTRY: &str = "lifebus_core::registry";
    /// Publishing and thread-affinity dispatch.
    pub const DISPATCH: &str = "lifebus_core::dispatch";
    /// Owner lifecycles and the bridges bound to them.
    pub const LIFECYCLE: &str = "lifebus_core::lifecycle";
    /// Affinity-thread task queues.
    pub const MAIN_LOOP: &str = "lifebus_core::main_loop";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
}

/// Configuration for registry debug output.
#[derive(Debug, Clone)]
pub struct DebugFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show observer IDs.
    pub show_ids: bool,
    /// Whether to show full type paths instead of the last segment.
    pub full_type_names: bool,
}

impl Default for DebugFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: true,
            full_type_names: false,
        }
    }
}

impl DebugFormatOptions {
    /// Options for minimal output.
    pub fn minimal() -> Self {
        Self {
            show_ids: false,
            ..Default::default()
        }
    }

    /// Options using only ASCII characters.
    pub fn ascii() -> Self {
        Self {
            style: TreeStyle::Ascii,
            ..Default::default()
        }
    }
}

/// Debug utility for visualizing the registrations of a bus.
///
/// Event types are listed by name, each with its observers, their affinity,
/// and whether they are bound to an owner.
#[derive(Debug, Clone)]
pub struct RegistryDebug<'a> {
    bus: &'a EventBus,
    options: DebugFormatOptions,
}

impl<'a> RegistryDebug<'a> {
    /// Create a visualizer with default options.
    pub fn new(bus: &'a EventBus) -> Self {
        Self::with_options(bus, DebugFormatOptions::default())
    }

    /// Create a visualizer with custom options.
    pub fn with_options(bus: &'a EventBus, options: DebugFormatOptions) -> Self {
        Self { bus, options }
    }

    /// Render the tree.
    pub fn format(&self) -> String {
        let mut output = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_tree(&mut output);
        output
    }

    fn write_tree(&self, output: &mut String) -> fmt::Result {
        let mut entries = self.bus.registry().entries();
        let total: usize = entries.iter().map(|(_, handles)| handles.len()).sum();
        writeln!(
            output,
            "EventBus \"{}\" ({} observers):",
            self.bus.config().name,
            total
        )?;

        if entries.is_empty() {
            return writeln!(output, "  (empty)");
        }

        entries.sort_by_key(|(event_type, _)| event_type.name());
        let (tee, corner, pipe, blank) = match self.options.style {
            TreeStyle::Ascii => ("+-- ", "`-- ", "|   ", "    "),
            TreeStyle::Unicode => (
                "\u{251c}\u{2500}\u{2500} ",
                "\u{2514}\u{2500}\u{2500} ",
                "\u{2502}   ",
                "    ",
            ),
        };

        let type_count = entries.len();
        for (i, (event_type, mut handles)) in entries.into_iter().enumerate() {
            let last_type = i + 1 == type_count;
            writeln!(
                output,
                "{}{} ({})",
                if last_type { corner } else { tee },
                self.type_name(event_type.name()),
                handles.len()
            )?;

            handles.sort_by_key(|handle| handle.observer_id().as_usize());
            let handle_count = handles.len();
            for (j, handle) in handles.iter().enumerate() {
                let last_handle = j + 1 == handle_count;
                output.push_str(if last_type { blank } else { pipe });
                output.push_str(if last_handle { corner } else { tee });
                output.push_str(self.type_name(handle.observer_name()));
                if self.options.show_ids {
                    write!(output, " [{}]", handle.observer_id())?;
                }
                let affinity = match handle.affinity() {
                    ThreadAffinity::Origin => "origin",
                    ThreadAffinity::Main => "main",
                };
                let binding = if handle.is_bound() { "bound" } else { "permanent" };
                writeln!(output, " ({affinity}, {binding})")?;
            }
        }
        Ok(())
    }

    fn type_name<'n>(&self, name: &'n str) -> &'n str {
        if self.options.full_type_names {
            return name;
        }
        // Strip the module path, keeping any generic arguments intact.
        let path_end = name.find('<').unwrap_or(name.len());
        match name[..path_end].rfind("::") {
            Some(split) => &name[split + 2..],
            None => name,
        }
    }
}

impl fmt::Display for RegistryDebug<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{Lifecycle, LifecycleEvent};
    use crate::observer::observer_fn;
    use std::sync::Arc;

    struct Alpha;
    struct Beta;

    #[test]
    fn test_empty_registry() {
        let bus = EventBus::builder().name("empty").build();
        let output = RegistryDebug::new(&bus).format();
        assert_eq!(output, "EventBus \"empty\" (0 observers):\n  (empty)\n");
    }

    #[test]
    fn test_tree_lists_types_in_name_order() {
        let bus = EventBus::new();
        let owner = Arc::new(Lifecycle::new());
        owner.handle_event(LifecycleEvent::Create);

        let beta = observer_fn(|_: &Beta| {});
        let alpha = observer_fn(|_: &Alpha| {});
        bus.register_permanent(&beta);
        bus.register_with(&owner, &alpha, ThreadAffinity::Main);

        let output = RegistryDebug::with_options(&bus, DebugFormatOptions::minimal()).format();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("(2 observers)"));
        assert!(lines[1].starts_with("\u{251c}\u{2500}\u{2500} Alpha (1)"));
        assert!(lines[2].ends_with("(main, bound)"));
        assert!(lines[3].starts_with("\u{2514}\u{2500}\u{2500} Beta (1)"));
        assert!(lines[4].ends_with("(origin, permanent)"));
    }

    #[test]
    fn test_ascii_style_and_ids() {
        let bus = EventBus::new();
        let observer = observer_fn(|_: &Alpha| {});
        bus.register_permanent(&observer);

        let output = RegistryDebug::with_options(&bus, DebugFormatOptions::ascii()).format();
        assert!(output.is_ascii());
        assert!(output.contains("`-- Alpha (1)"));
        assert!(output.contains(&format!("[{}]", crate::observer::ObserverId::of(&observer))));
    }

    #[test]
    fn test_short_type_names() {
        let bus = EventBus::new();
        let debug = RegistryDebug::new(&bus);
        assert_eq!(debug.type_name("my_crate::events::Tick"), "Tick");
        assert_eq!(debug.type_name("Vec<my_crate::Tick>"), "Vec<my_crate::Tick>");
        assert_eq!(debug.type_name("alloc::vec::Vec<u8>"), "Vec<u8>");
        assert_eq!(debug.type_name("u32"), "u32");
    }
}
