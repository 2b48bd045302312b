//! Layout sessions - lifecycle coordination over pluggable layout kinds.
//!
//! ## Architecture
//!
//! - **SessionManager**: owns the single session slot and serializes every
//!   transition on its Monitor
//! - **LayoutRegistry**: fixed ordered set of layout factories, one default
//! - **LayoutSession**: capability implemented by concrete layouts (pane
//!   arrangement, rendering) outside the core
//!
//! ## Lifecycle
//!
//! ```text
//! open()            -> resolve kind, override settings, factory.create(),
//!                      try_activate()
//! switch_layout()   -> deactivate old + activate new, one critical section
//! close()           -> deactivate, restore settings
//! (external close)  -> deactivation notice, restore settings,
//!                      reopen offer if conflicts remain
//! ```

pub mod factory;
pub mod manager;
pub mod types;

pub use factory::{LayoutContext, LayoutFactory, LayoutRegistry, LayoutSession};
pub use manager::{SessionManager, LAYOUT_KIND_SETTING};
pub use types::{
    ContentUri, DeactivationNotice, DiffedUris, FocusDirection, LayoutEvent, LifecycleState,
    SessionId,
};
