//! Parley - layout session coordination for a diff/merge cockpit.
//!
//! Coordinates transitions between mutually exclusive layout sessions and
//! guarantees that a fixed set of host configuration values is overridden
//! while a session is active and precisely restored afterward, across
//! process restarts and concurrent requests.
//!
//! The core is three pieces:
//!
//! - [`monitor::Monitor`]: async mutual exclusion with FIFO hand-off and
//!   waiter introspection, one instance per protected domain
//! - [`settings::SettingsManager`]: snapshot/override/restore of managed
//!   configuration keys through durable storage
//! - [`sessions::SessionManager`]: the lifecycle state machine over
//!   pluggable layout factories
//!
//! Rendering, file merging, and editor integration stay behind capability
//! traits ([`config::ConfigStore`], [`sessions::LayoutSession`],
//! [`prompt::Prompter`], [`conflicts::ConflictInspector`]).

pub mod config;
pub mod conflicts;
pub mod error;
pub mod monitor;
pub mod prompt;
pub mod sessions;
pub mod settings;
pub mod zoom;

pub use error::SessionError;
pub use monitor::{Monitor, MonitorGuard};
