//! Session manager - coordinates mutually exclusive layout sessions.
//!
//! At most one layout session exists at a time. Every transition (open,
//! switch, close) runs under the manager's Monitor, so no two transitions
//! ever interleave their effects; the zoom side channel sheds itself under
//! contention instead of queueing. Settings overrides are applied before a
//! session is constructed and restored when the last session ends.
//!
//! Deactivation notices arrive asynchronously on a channel drained by a
//! spawned task. The notice handler clears the session slot without taking
//! the Monitor - the notice is the single authoritative source of "this
//! session has ended", and the session-id check makes the write idempotent -
//! then briefly re-enters the Monitor to restore settings.

use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::factory::{LayoutContext, LayoutFactory, LayoutRegistry, LayoutSession};
use super::types::{
    DeactivationNotice, DiffedUris, FocusDirection, LayoutEvent, SessionId,
};
use crate::config::ConfigStore;
use crate::conflicts::ConflictInspector;
use crate::error::SessionError;
use crate::monitor::Monitor;
use crate::prompt::Prompter;
use crate::settings::SettingsManager;
use crate::zoom::{Zoom, ZoomManager};

/// Configuration key holding the preferred layout kind.
pub const LAYOUT_KIND_SETTING: &str = "parley.layout";

/// The session currently owned by the manager.
#[derive(Clone)]
struct ActiveEntry {
    id: SessionId,
    kind: String,
    uris: DiffedUris,
    session: Arc<dyn LayoutSession>,
    system_initiated: bool,
}

/// Coordinates layout session lifecycle.
pub struct SessionManager {
    /// Serializes open/switch/close transitions.
    monitor: Monitor,
    /// Shared with sessions for their internal rendering work; a separate
    /// instance so neither domain ever waits on the other's lock.
    render_monitor: Arc<Monitor>,
    config: Arc<dyn ConfigStore>,
    settings: Arc<SettingsManager>,
    registry: LayoutRegistry,
    prompter: Arc<dyn Prompter>,
    conflicts: Arc<dyn ConflictInspector>,
    zoom: Arc<dyn ZoomManager>,
    /// Written by locked transitions and by the notice handler.
    slot: Mutex<Option<ActiveEntry>>,
    notices: mpsc::UnboundedSender<DeactivationNotice>,
    events: broadcast::Sender<LayoutEvent>,
}

impl SessionManager {
    /// Build the manager and spawn its deactivation-notice loop.
    pub fn new(
        config: Arc<dyn ConfigStore>,
        settings: Arc<SettingsManager>,
        registry: LayoutRegistry,
        prompter: Arc<dyn Prompter>,
        conflicts: Arc<dyn ConflictInspector>,
        zoom: Arc<dyn ZoomManager>,
    ) -> Arc<Self> {
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(32);

        let manager = Arc::new(Self {
            monitor: Monitor::new(),
            render_monitor: Arc::new(Monitor::new()),
            config,
            settings,
            registry,
            prompter,
            conflicts,
            zoom,
            slot: Mutex::new(None),
            notices: notice_tx,
            events,
        });

        tokio::spawn(Self::drain_notices(Arc::downgrade(&manager), notice_rx));
        manager
    }

    /// Subscribe to lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<LayoutEvent> {
        self.events.subscribe()
    }

    /// Content tuple of the current session, if any.
    pub fn diffed_uris(&self) -> Option<DiffedUris> {
        self.slot.lock().unwrap().as_ref().map(|e| e.uris.clone())
    }

    pub fn is_active(&self) -> bool {
        self.slot
            .lock()
            .unwrap()
            .as_ref()
            .map(|e| e.session.is_active() || e.session.is_activating())
            .unwrap_or(false)
    }

    /// Open a layout session for a content tuple.
    ///
    /// Returns `Ok(false)` when the same content (backup identity ignored)
    /// is already open. A user-initiated open replaces a session showing
    /// different content; a system-initiated one refuses to, so automation
    /// never tears down what the user is looking at.
    pub async fn open(
        &self,
        uris: DiffedUris,
        system_initiated: bool,
    ) -> Result<bool, SessionError> {
        let mut pending = Vec::new();
        let result = {
            let _guard = self.monitor.enter().await;
            self.open_locked(uris, system_initiated, &mut pending).await
        };
        self.emit_all(pending);
        result
    }

    async fn open_locked(
        &self,
        uris: DiffedUris,
        system_initiated: bool,
        pending: &mut Vec<LayoutEvent>,
    ) -> Result<bool, SessionError> {
        {
            let slot = self.slot.lock().unwrap();
            if let Some(entry) = slot.as_ref() {
                if entry.uris.same_content(&uris) {
                    debug!("content already open in layout {}", entry.kind);
                    return Ok(false);
                }
                if system_initiated {
                    return Err(SessionError::SessionBusy);
                }
            }
        }

        // Resolve the kind before touching the old session: a cancelled
        // repair prompt must leave whatever was active exactly as it was.
        let factory = self.resolve_kind().await?;

        // Replace a session showing different content; awaited here, inside
        // the same critical section, so no second session is ever registered
        // while the first still settles.
        if self.slot.lock().unwrap().is_some() {
            match self.close_locked(pending).await {
                Ok(()) => {}
                // The session ended externally between the check and here.
                Err(SessionError::NoActiveSession) => {}
                Err(err) => return Err(err),
            }
        }

        self.settings.activate().await?;

        let entry = self.construct(&factory, uris, system_initiated);
        *self.slot.lock().unwrap() = Some(entry.clone());

        info!("activating layout {} for {}", entry.kind, entry.uris);
        if let Err(err) = entry.session.try_activate(self.zoom.current(), false).await {
            self.cleanup_failed_activation(&entry).await;
            return Err(SessionError::External(err));
        }

        pending.push(LayoutEvent::Activated {
            session: entry.id,
            kind: entry.kind,
            uris: entry.uris,
        });
        Ok(true)
    }

    /// Switch the active session to another layout kind.
    ///
    /// With no target named, prompts among the registered kinds other than
    /// the current one. The old session is deactivated and the new one
    /// activated under a single Monitor acquisition; the session slot is
    /// overwritten, never emptied, so a watcher polling [`Self::diffed_uris`]
    /// sees no gap.
    pub async fn switch_layout(&self, target: Option<&str>) -> Result<(), SessionError> {
        let mut pending = Vec::new();
        let result = {
            let _guard = self.monitor.enter().await;
            self.switch_locked(target, &mut pending).await
        };
        self.emit_all(pending);
        result
    }

    async fn switch_locked(
        &self,
        target: Option<&str>,
        pending: &mut Vec<LayoutEvent>,
    ) -> Result<(), SessionError> {
        let current = self
            .slot
            .lock()
            .unwrap()
            .clone()
            .ok_or(SessionError::NoActiveSession)?;

        let target_value = match target {
            Some(value) => {
                if self.registry.by_setting_value(value).is_none() {
                    return Err(SessionError::UnknownKind(value.to_string()));
                }
                value.to_string()
            }
            None => {
                let others: Vec<_> = self
                    .registry
                    .iter()
                    .filter(|f| f.setting_value() != current.kind)
                    .collect();
                let labels: Vec<String> =
                    others.iter().map(|f| f.display_name().to_string()).collect();
                let choice = self
                    .prompter
                    .pick("Switch to which layout?", &labels)
                    .await
                    .map_err(SessionError::External)?;
                match choice.and_then(|i| others.get(i)) {
                    Some(factory) => factory.setting_value().to_string(),
                    None => return Err(SessionError::Cancelled),
                }
            }
        };

        // The state may have moved between the prompt and its answer; a
        // target equal to the current kind is a stale request.
        if target_value == current.kind {
            return Err(SessionError::StaleTarget(target_value));
        }
        let factory = self
            .registry
            .by_setting_value(&target_value)
            .expect("validated above")
            .clone();

        info!("switching layout {} -> {}", current.kind, target_value);
        current
            .session
            .deactivate(true)
            .await
            .map_err(SessionError::External)?;

        // Settings overrides stay in place: a session remains active across
        // the whole switch.
        let entry = self.construct(&factory, current.uris.clone(), current.system_initiated);
        *self.slot.lock().unwrap() = Some(entry.clone());

        match entry.session.try_activate(self.zoom.current(), true).await {
            Ok(()) => {
                if let Err(err) = self
                    .config
                    .set(LAYOUT_KIND_SETTING, Value::String(target_value))
                    .await
                {
                    warn!("failed to remember layout kind: {err:#}");
                }
                pending.push(LayoutEvent::Deactivated {
                    session: current.id,
                    kind: current.kind,
                    uris: current.uris,
                });
                pending.push(LayoutEvent::Activated {
                    session: entry.id,
                    kind: entry.kind,
                    uris: entry.uris,
                });
                Ok(())
            }
            Err(err) => {
                self.cleanup_failed_activation(&entry).await;
                pending.push(LayoutEvent::Deactivated {
                    session: current.id,
                    kind: current.kind,
                    uris: current.uris,
                });
                Err(SessionError::External(err))
            }
        }
    }

    /// Explicitly close the active session and restore settings.
    pub async fn close(&self) -> Result<(), SessionError> {
        let mut pending = Vec::new();
        let result = {
            let _guard = self.monitor.enter().await;
            self.close_locked(&mut pending).await
        };
        self.emit_all(pending);
        result
    }

    async fn close_locked(&self, pending: &mut Vec<LayoutEvent>) -> Result<(), SessionError> {
        let entry = self
            .slot
            .lock()
            .unwrap()
            .take()
            .ok_or(SessionError::NoActiveSession)?;

        info!("deactivating layout {} for {}", entry.kind, entry.uris);
        // The session is gone either way; finish the cleanup before
        // reporting the first failure.
        let mut failure = entry.session.deactivate(true).await.err();
        if let Err(err) = self.settings.reset().await {
            failure.get_or_insert(err);
        }

        pending.push(LayoutEvent::Deactivated {
            session: entry.id,
            kind: entry.kind,
            uris: entry.uris,
        });
        match failure {
            None => Ok(()),
            Some(err) => Err(SessionError::External(err)),
        }
    }

    /// Apply a zoom adjustment to the active session.
    ///
    /// Advisory: when another transition already has waiters queued on the
    /// Monitor the request is dropped silently rather than piled up behind
    /// it. With no active session the request fails visibly.
    pub async fn set_zoom(&self, zoom: Zoom) -> Result<(), SessionError> {
        if self.monitor.someone_is_waiting() {
            debug!("dropping zoom request, a transition is already queued");
            return Ok(());
        }
        let _guard = self.monitor.enter().await;

        let entry = self
            .slot
            .lock()
            .unwrap()
            .clone()
            .ok_or(SessionError::NoActiveSession)?;
        self.zoom.remember(zoom);
        entry
            .session
            .set_layout(zoom)
            .await
            .map_err(SessionError::External)
    }

    /// Save the merged document of the active session.
    pub async fn save(&self) -> Result<(), SessionError> {
        let entry = self
            .slot
            .lock()
            .unwrap()
            .clone()
            .ok_or(SessionError::NoActiveSession)?;
        entry.session.save().await.map_err(SessionError::External)
    }

    /// Move focus to the next or previous merge conflict.
    pub fn focus_merge_conflict(&self, direction: FocusDirection) -> Result<bool, SessionError> {
        let entry = self
            .slot
            .lock()
            .unwrap()
            .clone()
            .ok_or(SessionError::NoActiveSession)?;
        entry
            .session
            .focus_merge_conflict(direction)
            .map_err(SessionError::External)
    }

    /// Resolve the configured layout kind, repairing an unrecognized value
    /// interactively.
    ///
    /// The repair loop terminates only through a valid kind or explicit
    /// cancellation. A "restore default" choice persists to configuration
    /// immediately, even if the surrounding request is later abandoned.
    async fn resolve_kind(&self) -> Result<Arc<dyn LayoutFactory>, SessionError> {
        let configured = self
            .config
            .get(LAYOUT_KIND_SETTING)
            .await
            .map_err(SessionError::External)?;
        let mut value = match configured {
            Value::String(value) => value,
            Value::Null => return Ok(self.registry.default_factory().clone()),
            other => other.to_string(),
        };

        loop {
            if let Some(factory) = self.registry.by_setting_value(&value) {
                return Ok(factory.clone());
            }

            warn!("configured layout kind `{}` is not registered", value);
            let default = self.registry.default_factory();
            let items = vec![
                format!("Restore the default layout ({})", default.display_name()),
                "Use the default layout once".to_string(),
                "Cancel".to_string(),
            ];
            let choice = self
                .prompter
                .pick(
                    &format!("Layout kind `{value}` is not one of the known layouts"),
                    &items,
                )
                .await
                .map_err(SessionError::External)?;

            match choice {
                Some(0) => {
                    self.config
                        .set(
                            LAYOUT_KIND_SETTING,
                            Value::String(default.setting_value().to_string()),
                        )
                        .await
                        .map_err(SessionError::External)?;
                    value = default.setting_value().to_string();
                }
                Some(1) => return Ok(default.clone()),
                _ => return Err(SessionError::Cancelled),
            }
        }
    }

    fn construct(
        &self,
        factory: &Arc<dyn LayoutFactory>,
        uris: DiffedUris,
        system_initiated: bool,
    ) -> ActiveEntry {
        let id = SessionId::generate();
        let context = LayoutContext {
            session: id.clone(),
            uris: uris.clone(),
            render_monitor: self.render_monitor.clone(),
            settings: self.settings.clone(),
            config: self.config.clone(),
            zoom: self.zoom.clone(),
            notices: self.notices.clone(),
        };
        let session = factory.create(context);
        ActiveEntry {
            id,
            kind: factory.setting_value().to_string(),
            uris,
            session,
            system_initiated,
        }
    }

    /// Undo a half-finished activation: the failed session is torn down and
    /// settings are restored, leaving no session registered.
    async fn cleanup_failed_activation(&self, entry: &ActiveEntry) {
        warn!("layout {} failed to activate, cleaning up", entry.kind);
        {
            let mut slot = self.slot.lock().unwrap();
            if slot.as_ref().map(|e| e.id == entry.id).unwrap_or(false) {
                *slot = None;
            }
        }
        if let Err(err) = entry.session.deactivate(true).await {
            warn!("failed-session teardown also failed: {err:#}");
        }
        if let Err(err) = self.settings.reset().await {
            warn!("failed to restore settings after activation failure: {err:#}");
        }
    }

    async fn drain_notices(
        manager: Weak<Self>,
        mut notices: mpsc::UnboundedReceiver<DeactivationNotice>,
    ) {
        while let Some(notice) = notices.recv().await {
            let Some(manager) = manager.upgrade() else {
                break;
            };
            manager.handle_notice(notice).await;
        }
    }

    /// Handle a session's deactivation notice.
    ///
    /// Manager-initiated deactivations already did their cleanup inside the
    /// transition that requested them; their notices carry `by_manager` and
    /// are dropped here. An external notice (the user closed the views)
    /// clears the slot, restores settings, emits the lifecycle event, and
    /// offers to reopen when the backing content still holds conflict
    /// markers.
    async fn handle_notice(&self, notice: DeactivationNotice) {
        if notice.by_manager {
            return;
        }

        // Authoritative and idempotent: take the slot only while it still
        // names this session. A notice from a session replaced by a switch
        // is stale.
        let entry = {
            let mut slot = self.slot.lock().unwrap();
            let current = slot
                .as_ref()
                .map(|entry| entry.id == notice.session)
                .unwrap_or(false);
            if current {
                slot.take()
            } else {
                None
            }
        };
        let Some(entry) = entry else {
            debug!("ignoring stale deactivation notice for {}", notice.session);
            return;
        };

        info!("layout {} for {} ended externally", entry.kind, entry.uris);
        {
            let _guard = self.monitor.enter().await;
            // A transition may have installed a fresh session while we
            // waited; its overrides must stay in place.
            if self.slot.lock().unwrap().is_none() {
                if let Err(err) = self.settings.reset().await {
                    warn!("failed to restore settings after session end: {err:#}");
                }
            }
        }

        let _ = self.events.send(LayoutEvent::Deactivated {
            session: entry.id,
            kind: entry.kind.clone(),
            uris: entry.uris.clone(),
        });

        match self.conflicts.has_unresolved_conflicts(&entry.uris).await {
            Ok(true) => {
                let items = vec![
                    "Reopen the merge layout".to_string(),
                    "Keep it closed".to_string(),
                ];
                let choice = self
                    .prompter
                    .pick(
                        "The closed file still contains merge conflict markers",
                        &items,
                    )
                    .await
                    .unwrap_or(None);
                if choice == Some(0) {
                    if let Err(err) = self.open(entry.uris.clone(), true).await {
                        warn!("could not reopen {}: {err:#}", entry.uris);
                    }
                }
            }
            Ok(false) => {}
            Err(err) => warn!("conflict inspection failed for {}: {err:#}", entry.uris),
        }
    }

    fn emit_all(&self, pending: Vec<LayoutEvent>) {
        for event in pending {
            let _ = self.events.send(event);
        }
    }
}
