//! Temporary configuration overrides with snapshot and restore.
//!
//! While a layout session is active a fixed set of configuration keys is
//! forced to known values (the managed set). Before forcing a key the
//! manager remembers what the user had, in durable storage, and `reset`
//! puts it back afterwards. The protocol only touches what it owns:
//!
//! - a key the user edited *between* sessions is re-read, so the manual
//!   value is what gets restored later, not a stale snapshot;
//! - a key the user edited *during* a session (away from the forced target)
//!   is left exactly as the user set it on reset;
//! - a key dropped from the managed set is restored immediately on the next
//!   activation (it is no longer ours to hold).
//!
//! Skipping `reset` entirely (a crash with overrides still in place) needs
//! no recovery path: the next `activate` reconciles through the same
//! old-target comparison.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::ConfigStore;
use crate::monitor::Monitor;
use memento::KeyValueStore;

/// Storage key for the remembered pre-override values.
pub const ORIGINAL_ACTUAL_KEY: &str = "parley/settings/original-actual";
/// Storage key for the values the overrides forced.
pub const ORIGINAL_TARGET_KEY: &str = "parley/settings/original-target";

/// One configuration key the manager is authorized to override.
#[derive(Debug, Clone)]
pub struct ManagedSetting {
    pub key: String,
    pub target: Value,
}

impl ManagedSetting {
    pub fn new(key: impl Into<String>, target: Value) -> Self {
        Self {
            key: key.into(),
            target,
        }
    }
}

/// Records original values of the managed keys before overriding them, and
/// restores them later.
///
/// A dedicated [`Monitor`] serializes `activate` against `reset`, so a
/// concurrent caller never observes a partially replaced snapshot.
pub struct SettingsManager {
    monitor: Monitor,
    config: Arc<dyn ConfigStore>,
    store: Arc<dyn KeyValueStore>,
    managed: Vec<ManagedSetting>,
}

impl SettingsManager {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        store: Arc<dyn KeyValueStore>,
        managed: Vec<ManagedSetting>,
    ) -> Self {
        Self {
            monitor: Monitor::new(),
            config,
            store,
            managed,
        }
    }

    /// Force every managed key to its target value, remembering originals.
    ///
    /// Safe to call with overrides already in place: keys the user left at
    /// the previously forced value keep their earlier remembered original,
    /// keys the user touched in between get the fresh live value remembered
    /// instead. Keys that fell out of the managed set since the previous
    /// activation are restored right away.
    pub async fn activate(&self) -> Result<()> {
        let _guard = self.monitor.enter().await;

        let old_actual = self.load_record(ORIGINAL_ACTUAL_KEY).await?;
        let old_target = self.load_record(ORIGINAL_TARGET_KEY).await?;

        let mut new_actual = Map::new();
        let mut new_target = Map::new();

        for setting in &self.managed {
            let live = self
                .config
                .get(&setting.key)
                .await
                .with_context(|| format!("failed to read setting {}", setting.key))?;

            if live != setting.target {
                self.config
                    .set(&setting.key, setting.target.clone())
                    .await
                    .with_context(|| format!("failed to override setting {}", setting.key))?;
                debug!("overrode setting {} -> {}", setting.key, setting.target);
            }

            // If the live value is still what we forced last time, the user
            // never touched it: carry the earlier original forward. A value
            // that differs is a manual edit and becomes the new original.
            let remembered = match old_target.get(&setting.key) {
                Some(previous_target) if *previous_target == live => old_actual
                    .get(&setting.key)
                    .cloned()
                    .unwrap_or_else(|| live.clone()),
                _ => live.clone(),
            };

            new_actual.insert(setting.key.clone(), remembered);
            new_target.insert(setting.key.clone(), setting.target.clone());
        }

        // Keys we overrode in a previous run but no longer manage are not
        // ours to hold; put them back now.
        for (key, original) in &old_actual {
            if self.managed.iter().any(|s| s.key == *key) {
                continue;
            }
            self.config
                .set(key, original.clone())
                .await
                .with_context(|| format!("failed to restore obsolete setting {key}"))?;
            info!("restored obsolete setting {}", key);
        }

        self.store
            .update(ORIGINAL_ACTUAL_KEY, Some(Value::Object(new_actual)))
            .await
            .context("failed to persist settings snapshot")?;
        self.store
            .update(ORIGINAL_TARGET_KEY, Some(Value::Object(new_target)))
            .await
            .context("failed to persist settings snapshot")?;

        info!("settings overrides active for {} keys", self.managed.len());
        Ok(())
    }

    /// Undo the overrides and clear the persisted snapshot.
    ///
    /// A key the user changed away from the forced target while overridden
    /// is left untouched.
    pub async fn reset(&self) -> Result<()> {
        let _guard = self.monitor.enter().await;

        let orig_actual = self.load_record(ORIGINAL_ACTUAL_KEY).await?;
        let orig_target = self.load_record(ORIGINAL_TARGET_KEY).await?;

        for (key, original) in &orig_actual {
            let live = self
                .config
                .get(key)
                .await
                .with_context(|| format!("failed to read setting {key}"))?;

            if orig_target.get(key) == Some(&live) {
                self.config
                    .set(key, original.clone())
                    .await
                    .with_context(|| format!("failed to restore setting {key}"))?;
                debug!("restored setting {} -> {}", key, original);
            } else {
                debug!("setting {} changed while overridden, keeping user value", key);
            }
        }

        self.store
            .update(ORIGINAL_ACTUAL_KEY, None)
            .await
            .context("failed to clear settings snapshot")?;
        self.store
            .update(ORIGINAL_TARGET_KEY, None)
            .await
            .context("failed to clear settings snapshot")?;

        info!("settings overrides cleared");
        Ok(())
    }

    async fn load_record(&self, key: &str) -> Result<Map<String, Value>> {
        match self.store.get(key).await? {
            Some(Value::Object(map)) => Ok(map),
            Some(other) => anyhow::bail!("settings record {key} holds non-object value: {other}"),
            None => Ok(Map::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use memento::MemoryStore;
    use serde_json::json;

    fn manager_with(
        managed: Vec<ManagedSetting>,
    ) -> (Arc<MemoryConfig>, Arc<MemoryStore>, SettingsManager) {
        let config = Arc::new(MemoryConfig::new());
        let store = Arc::new(MemoryStore::new());
        let manager = SettingsManager::new(config.clone(), store.clone(), managed);
        (config, store, manager)
    }

    fn managed_ab() -> Vec<ManagedSetting> {
        vec![
            ManagedSetting::new("A", json!(false)),
            ManagedSetting::new("B", json!("none")),
        ]
    }

    async fn snapshot(store: &MemoryStore, key: &str) -> Option<Value> {
        store.get(key).await.unwrap()
    }

    #[tokio::test]
    async fn test_activate_forces_targets_and_records_originals() {
        let (config, store, manager) = manager_with(managed_ab());
        config
            .seed([("A".into(), json!(true)), ("B".into(), json!("none"))])
            .await;

        manager.activate().await.unwrap();

        assert_eq!(config.get("A").await.unwrap(), json!(false));
        assert_eq!(config.get("B").await.unwrap(), json!("none"));

        // The actual value is recorded for every managed key, whether or not
        // an override write happened.
        assert_eq!(
            snapshot(&store, ORIGINAL_ACTUAL_KEY).await,
            Some(json!({"A": true, "B": "none"}))
        );
        assert_eq!(
            snapshot(&store, ORIGINAL_TARGET_KEY).await,
            Some(json!({"A": false, "B": "none"}))
        );
    }

    #[tokio::test]
    async fn test_round_trip_restores_and_clears() {
        let (config, store, manager) = manager_with(managed_ab());
        config
            .seed([("A".into(), json!(true)), ("B".into(), json!("none"))])
            .await;

        manager.activate().await.unwrap();
        manager.reset().await.unwrap();

        assert_eq!(config.get("A").await.unwrap(), json!(true));
        assert_eq!(config.get("B").await.unwrap(), json!("none"));
        assert_eq!(snapshot(&store, ORIGINAL_ACTUAL_KEY).await, None);
        assert_eq!(snapshot(&store, ORIGINAL_TARGET_KEY).await, None);
    }

    #[tokio::test]
    async fn test_activate_twice_is_idempotent() {
        let (config, store, manager) = manager_with(managed_ab());
        config
            .seed([("A".into(), json!(true)), ("B".into(), json!("none"))])
            .await;

        manager.activate().await.unwrap();
        let actual_after_first = snapshot(&store, ORIGINAL_ACTUAL_KEY).await;
        let target_after_first = snapshot(&store, ORIGINAL_TARGET_KEY).await;

        manager.activate().await.unwrap();

        assert_eq!(config.get("A").await.unwrap(), json!(false));
        assert_eq!(snapshot(&store, ORIGINAL_ACTUAL_KEY).await, actual_after_first);
        assert_eq!(snapshot(&store, ORIGINAL_TARGET_KEY).await, target_after_first);

        // And the remembered original still wins on reset.
        manager.reset().await.unwrap();
        assert_eq!(config.get("A").await.unwrap(), json!(true));
    }

    #[tokio::test]
    async fn test_manual_edit_during_override_is_preserved() {
        let (config, _store, manager) = manager_with(managed_ab());
        config
            .seed([("A".into(), json!(true)), ("B".into(), json!("none"))])
            .await;

        manager.activate().await.unwrap();
        // User flips A back while the override is live.
        config.set("A", json!(true)).await.unwrap();

        manager.reset().await.unwrap();

        // The manual value stands; reset must not clobber it.
        assert_eq!(config.get("A").await.unwrap(), json!(true));
        // B was never touched and goes back to its original.
        assert_eq!(config.get("B").await.unwrap(), json!("none"));
    }

    #[tokio::test]
    async fn test_edit_between_sessions_becomes_the_new_original() {
        let (config, _store, manager) = manager_with(managed_ab());
        config
            .seed([("A".into(), json!(true)), ("B".into(), json!("none"))])
            .await;

        // First session ends without reset (crash); overrides stay live.
        manager.activate().await.unwrap();
        // User picks a new value between sessions.
        config.set("A", json!("user-picked")).await.unwrap();

        manager.activate().await.unwrap();
        manager.reset().await.unwrap();

        // The manually-chosen value is restored, not the stale original.
        assert_eq!(config.get("A").await.unwrap(), json!("user-picked"));
    }

    #[tokio::test]
    async fn test_untouched_value_keeps_first_original_across_sessions() {
        let (config, _store, manager) = manager_with(managed_ab());
        config
            .seed([("A".into(), json!(true)), ("B".into(), json!("none"))])
            .await;

        // Two activations with no reset and no user edits in between: the
        // live value equals the old target, so the first original carries.
        manager.activate().await.unwrap();
        manager.activate().await.unwrap();
        manager.reset().await.unwrap();

        assert_eq!(config.get("A").await.unwrap(), json!(true));
    }

    #[tokio::test]
    async fn test_obsolete_key_restored_on_next_activation() {
        let config = Arc::new(MemoryConfig::new());
        let store = Arc::new(MemoryStore::new());
        config
            .seed([("A".into(), json!(true)), ("B".into(), json!("wide"))])
            .await;

        let first = SettingsManager::new(
            config.clone(),
            store.clone(),
            vec![
                ManagedSetting::new("A", json!(false)),
                ManagedSetting::new("B", json!("none")),
            ],
        );
        first.activate().await.unwrap();
        assert_eq!(config.get("B").await.unwrap(), json!("none"));

        // The managed set shrinks to just A; B is obsolete and comes back.
        let second = SettingsManager::new(
            config.clone(),
            store.clone(),
            vec![ManagedSetting::new("A", json!(false))],
        );
        second.activate().await.unwrap();

        assert_eq!(config.get("B").await.unwrap(), json!("wide"));
        assert_eq!(
            snapshot(&store, ORIGINAL_ACTUAL_KEY).await,
            Some(json!({"A": true}))
        );
    }

    #[tokio::test]
    async fn test_unset_key_round_trips_through_null() {
        let (config, _store, manager) = manager_with(vec![ManagedSetting::new("C", json!(7))]);

        manager.activate().await.unwrap();
        assert_eq!(config.get("C").await.unwrap(), json!(7));

        manager.reset().await.unwrap();
        assert_eq!(config.get("C").await.unwrap(), Value::Null);
    }
}
