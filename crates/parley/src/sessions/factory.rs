//! Layout session capability and the factory registry.
//!
//! The core never renders anything. A layout kind is a named factory that
//! knows how to build a session for a content tuple; the session drives its
//! own pane and view setup behind the [`LayoutSession`] trait. The registry
//! is a fixed ordered list consulted by kind identifier, with one entry
//! flagged as the default.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{DeactivationNotice, DiffedUris, FocusDirection, SessionId};
use crate::config::ConfigStore;
use crate::monitor::Monitor;
use crate::settings::SettingsManager;
use crate::zoom::{Zoom, ZoomManager};

/// One active instantiation of a layout kind.
///
/// Implementations own their rendering state and serialize internal layout
/// work on the shared rendering Monitor from their [`LayoutContext`]; the
/// manager only calls these methods while holding its own transition
/// Monitor, which is a different instance on purpose.
#[async_trait]
pub trait LayoutSession: Send + Sync {
    /// Run pane and view setup. `is_switch` marks an activation that
    /// replaces another layout for the same content.
    async fn try_activate(&self, zoom: Zoom, is_switch: bool) -> Result<()>;

    /// Re-apply the pane arrangement at the given zoom level.
    async fn set_layout(&self, zoom: Zoom) -> Result<()>;

    /// Tear the layout down. Must send the [`DeactivationNotice`] from the
    /// session's context exactly once, carrying `by_manager`.
    async fn deactivate(&self, by_manager: bool) -> Result<()>;

    /// Save the merged document.
    async fn save(&self) -> Result<()>;

    /// Move focus to the next or previous merge conflict. Returns whether a
    /// conflict was found.
    fn focus_merge_conflict(&self, direction: FocusDirection) -> Result<bool>;

    fn is_active(&self) -> bool;

    fn is_activating(&self) -> bool;

    fn diffed_uris(&self) -> DiffedUris;
}

/// Everything a factory needs to build a session.
#[derive(Clone)]
pub struct LayoutContext {
    pub session: SessionId,
    pub uris: DiffedUris,
    /// Serializes layout-internal rendering work; shared by all sessions,
    /// distinct from the manager's transition Monitor.
    pub render_monitor: Arc<Monitor>,
    pub settings: Arc<SettingsManager>,
    pub config: Arc<dyn ConfigStore>,
    pub zoom: Arc<dyn ZoomManager>,
    /// Deactivation notices flow back to the manager on this channel; a
    /// session sends exactly one, when its teardown completes.
    pub notices: mpsc::UnboundedSender<DeactivationNotice>,
}

/// Constructor for one layout kind.
pub trait LayoutFactory: Send + Sync {
    /// The kind identifier as stored in configuration.
    fn setting_value(&self) -> &str;

    /// Human-readable name for pickers.
    fn display_name(&self) -> &str;

    fn create(&self, context: LayoutContext) -> Arc<dyn LayoutSession>;
}

/// Fixed, ordered set of layout factories.
pub struct LayoutRegistry {
    factories: Vec<Arc<dyn LayoutFactory>>,
    default_index: usize,
}

impl LayoutRegistry {
    /// Build the registry.
    ///
    /// Panics on an empty factory list or a default value naming no
    /// registered factory; both are construction-time programming errors,
    /// not user-recoverable states.
    pub fn new(factories: Vec<Arc<dyn LayoutFactory>>, default_setting_value: &str) -> Self {
        assert!(!factories.is_empty(), "layout registry must not be empty");
        let default_index = factories
            .iter()
            .position(|f| f.setting_value() == default_setting_value)
            .unwrap_or_else(|| {
                panic!("default layout kind `{default_setting_value}` is not registered")
            });
        Self {
            factories,
            default_index,
        }
    }

    pub fn by_setting_value(&self, value: &str) -> Option<&Arc<dyn LayoutFactory>> {
        self.factories.iter().find(|f| f.setting_value() == value)
    }

    pub fn default_factory(&self) -> &Arc<dyn LayoutFactory> {
        &self.factories[self.default_index]
    }

    /// Factories in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn LayoutFactory>> {
        self.factories.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedFactory(&'static str);

    impl LayoutFactory for NamedFactory {
        fn setting_value(&self) -> &str {
            self.0
        }

        fn display_name(&self) -> &str {
            self.0
        }

        fn create(&self, _context: LayoutContext) -> Arc<dyn LayoutSession> {
            unimplemented!("not constructed in registry tests")
        }
    }

    fn factories(names: &[&'static str]) -> Vec<Arc<dyn LayoutFactory>> {
        names
            .iter()
            .map(|n| Arc::new(NamedFactory(n)) as Arc<dyn LayoutFactory>)
            .collect()
    }

    #[test]
    fn test_lookup_and_order() {
        let registry = LayoutRegistry::new(factories(&["three", "four-right", "four-down"]), "three");

        assert!(registry.by_setting_value("four-right").is_some());
        assert!(registry.by_setting_value("five").is_none());
        assert_eq!(registry.default_factory().setting_value(), "three");

        let order: Vec<_> = registry.iter().map(|f| f.setting_value().to_string()).collect();
        assert_eq!(order, vec!["three", "four-right", "four-down"]);
    }

    #[test]
    #[should_panic(expected = "layout registry must not be empty")]
    fn test_empty_registry_is_fatal() {
        LayoutRegistry::new(Vec::new(), "three");
    }

    #[test]
    #[should_panic(expected = "is not registered")]
    fn test_unknown_default_is_fatal() {
        LayoutRegistry::new(factories(&["three"]), "bogus");
    }
}
