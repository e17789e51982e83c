//! PersistenceManager - snapshots navigation and messages through a StorageAdapter
//!
//! Storage failures never reach the caller: saves report `false`, loads report
//! `None`, and the cause is logged.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::{PersistenceConfig, PersistenceOptions};
use super::snapshot::{PersistedSnapshot, SNAPSHOT_VERSION, SnapshotHeader, StorageInfo, ttl_elapsed};
use crate::clock::SharedClock;
use crate::config::PanelNavigation;
use crate::messaging::Message;

/// State shared with debounce tasks
struct Shared {
    options: PersistenceOptions,
    clock: SharedClock,
}

impl Shared {
    fn build_snapshot(
        &self,
        navigation: &BTreeMap<String, PanelNavigation>,
        messages: &HashMap<String, Vec<Message>>,
    ) -> PersistedSnapshot {
        let config = &self.options.config;

        let panel_navigation = if config.persist_navigation {
            navigation.clone()
        } else {
            BTreeMap::new()
        };

        let resource_messages = if config.persist_messages {
            messages
                .iter()
                .map(|(id, list)| {
                    let kept: Vec<Message> = list.iter().filter(|m| self.options.should_persist(m)).cloned().collect();
                    (id.clone(), kept)
                })
                .filter(|(_, list)| !list.is_empty())
                .collect()
        } else {
            HashMap::new()
        };

        PersistedSnapshot {
            panel_navigation,
            resource_messages,
            saved_at: self.clock.now_ms(),
            version: SNAPSHOT_VERSION.to_string(),
        }
    }

    async fn write(&self, snapshot: &PersistedSnapshot) -> bool {
        let key = &self.options.config.storage_key;
        debug!(%key, messages = snapshot.message_count(), "PersistenceManager::write: called");

        if !self.options.storage.is_available().await {
            warn!(%key, "Storage unavailable, state not saved");
            return false;
        }

        let serialized = match serde_json::to_string(snapshot) {
            Ok(serialized) => serialized,
            Err(e) => {
                warn!(%key, error = %e, "Failed to serialize state snapshot");
                return false;
            }
        };

        match self.options.storage.set_item(key, serialized).await {
            Ok(()) => {
                debug!(%key, "PersistenceManager::write: saved");
                true
            }
            Err(e) => {
                warn!(%key, error = %e, "Failed to save state snapshot");
                false
            }
        }
    }
}

/// Saves and restores coordination state independently of the storage backend
pub struct PersistenceManager {
    shared: Arc<Shared>,
    /// Pending debounced save, if any
    pending: Option<JoinHandle<()>>,
}

impl PersistenceManager {
    pub fn new(options: PersistenceOptions, clock: SharedClock) -> Self {
        debug!(?options, "PersistenceManager::new: called");
        Self {
            shared: Arc::new(Shared { options, clock }),
            pending: None,
        }
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.shared.options.config
    }

    pub fn options(&self) -> &PersistenceOptions {
        &self.shared.options
    }

    /// Build the snapshot that would be written for this state
    pub fn build_snapshot(
        &self,
        navigation: &BTreeMap<String, PanelNavigation>,
        messages: &HashMap<String, Vec<Message>>,
    ) -> PersistedSnapshot {
        self.shared.build_snapshot(navigation, messages)
    }

    /// Write a snapshot immediately
    pub async fn save_state(
        &self,
        navigation: &BTreeMap<String, PanelNavigation>,
        messages: &HashMap<String, Vec<Message>>,
    ) -> bool {
        debug!(panels = navigation.len(), "PersistenceManager::save_state: called");
        let snapshot = self.shared.build_snapshot(navigation, messages);
        self.shared.write(&snapshot).await
    }

    /// Read the stored snapshot
    ///
    /// Missing, unreadable, malformed and expired snapshots all yield `None`.
    pub async fn load_state(&self) -> Option<PersistedSnapshot> {
        let config = self.config();
        let key = &config.storage_key;
        debug!(%key, "PersistenceManager::load_state: called");

        let storage = &self.shared.options.storage;
        if !storage.is_available().await {
            warn!(%key, "Storage unavailable, no persisted state loaded");
            return None;
        }

        let raw = match storage.get_item(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(%key, "PersistenceManager::load_state: nothing stored");
                return None;
            }
            Err(e) => {
                warn!(%key, error = %e, "Failed to read persisted state");
                return None;
            }
        };

        let mut snapshot: PersistedSnapshot = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(%key, error = %e, "Ignoring malformed persisted state");
                return None;
            }
        };

        if snapshot.version != SNAPSHOT_VERSION {
            debug!(%key, version = %snapshot.version, "PersistenceManager::load_state: version differs");
        }

        let now = self.shared.clock.now_ms();
        if snapshot.is_expired(now, config.state_ttl_ms) {
            info!(%key, saved_at = snapshot.saved_at, "Persisted state expired, discarding");
            if let Err(e) = storage.remove_item(key).await {
                warn!(%key, error = %e, "Failed to remove expired state");
            }
            return None;
        }

        if !config.persist_navigation {
            snapshot.panel_navigation.clear();
        }
        if !config.persist_messages {
            snapshot.resource_messages.clear();
        }

        info!(
            %key,
            panels = snapshot.panel_navigation.len(),
            messages = snapshot.message_count(),
            "Loaded persisted state"
        );
        Some(snapshot)
    }

    /// Debounce a save: calls within the debounce window collapse into one write
    ///
    /// Returns `false` when auto-save is off or no async runtime is running.
    pub fn schedule_auto_save(
        &mut self,
        navigation: &BTreeMap<String, PanelNavigation>,
        messages: &HashMap<String, Vec<Message>>,
    ) -> bool {
        if !self.config().auto_save {
            debug!("PersistenceManager::schedule_auto_save: auto-save disabled");
            return false;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("No async runtime available, auto-save skipped");
                return false;
            }
        };

        self.cancel_pending();

        let snapshot = self.shared.build_snapshot(navigation, messages);
        let shared = self.shared.clone();
        let delay = self.config().auto_save_debounce();
        debug!(?delay, "PersistenceManager::schedule_auto_save: scheduled");

        self.pending = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            shared.write(&snapshot).await;
        }));
        true
    }

    /// Cancel a pending debounced save; returns whether one was pending
    pub fn cancel_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) if !handle.is_finished() => {
                debug!("PersistenceManager::cancel_pending: aborting pending save");
                handle.abort();
                true
            }
            _ => false,
        }
    }

    pub fn has_pending_save(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Remove the stored snapshot
    pub async fn clear_state(&self) -> bool {
        let key = &self.config().storage_key;
        debug!(%key, "PersistenceManager::clear_state: called");
        match self.shared.options.storage.remove_item(key).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%key, error = %e, "Failed to clear persisted state");
                false
            }
        }
    }

    /// Describe the stored snapshot without materializing its messages
    pub async fn get_storage_info(&self) -> StorageInfo {
        let config = self.config();
        let key = &config.storage_key;
        debug!(%key, "PersistenceManager::get_storage_info: called");

        let raw = match self.shared.options.storage.get_item(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return StorageInfo::default(),
            Err(e) => {
                warn!(%key, error = %e, "Failed to read storage info");
                return StorageInfo::default();
            }
        };

        let mut info = StorageInfo {
            exists: true,
            size_bytes: raw.len(),
            ..Default::default()
        };

        match serde_json::from_str::<SnapshotHeader>(&raw) {
            Ok(header) => {
                info.expired = ttl_elapsed(self.shared.clock.now_ms(), header.saved_at, config.state_ttl_ms);
                info.saved_at = Some(header.saved_at);
                info.version = Some(header.version);
            }
            Err(e) => debug!(%key, error = %e, "PersistenceManager::get_storage_info: unreadable header"),
        }

        info
    }
}

impl Drop for PersistenceManager {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::messaging::MessageContent;
    use crate::storage::{MemoryStorageAdapter, StorageAdapter};
    use std::time::Duration;

    fn manager(config: PersistenceConfig) -> (Arc<ManualClock>, Arc<MemoryStorageAdapter>, PersistenceManager) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let storage = Arc::new(MemoryStorageAdapter::new());
        let options = PersistenceOptions::new(storage.clone()).with_config(config);
        (clock.clone(), storage, PersistenceManager::new(options, clock))
    }

    fn message(id: &str, content: MessageContent) -> Message {
        Message {
            id: id.to_string(),
            timestamp: 1_000_000,
            from_resource_id: "a".to_string(),
            to_resource_id: Some("b".to_string()),
            content,
        }
    }

    fn sample_state() -> (BTreeMap<String, PanelNavigation>, HashMap<String, Vec<Message>>) {
        let mut navigation = BTreeMap::new();
        navigation.insert("main".to_string(), PanelNavigation { current_index: 1 });

        let mut messages = HashMap::new();
        messages.insert(
            "b".to_string(),
            vec![
                message("s1", MessageContent::state("hl", "highlight").with("value", "x")),
                message("e1", MessageContent::event("ping")),
            ],
        );
        (navigation, messages)
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let (_, _, manager) = manager(PersistenceConfig::default());
        let (navigation, messages) = sample_state();

        assert!(manager.save_state(&navigation, &messages).await);
        let loaded = manager.load_state().await.unwrap();

        assert_eq!(loaded.panel_navigation, navigation);
        assert_eq!(loaded.resource_messages["b"].len(), 1);
        assert_eq!(loaded.resource_messages["b"][0].id, "s1");
        assert_eq!(loaded.version, SNAPSHOT_VERSION);
    }

    #[tokio::test]
    async fn test_flags_exclude_sections() {
        let config = PersistenceConfig {
            persist_messages: false,
            persist_navigation: false,
            ..Default::default()
        };
        let (_, _, manager) = manager(config);
        let (navigation, messages) = sample_state();

        assert!(manager.save_state(&navigation, &messages).await);
        let loaded = manager.load_state().await.unwrap();
        assert!(loaded.panel_navigation.is_empty());
        assert!(loaded.resource_messages.is_empty());
    }

    #[tokio::test]
    async fn test_expired_snapshot_is_absent() {
        let config = PersistenceConfig {
            state_ttl_ms: 1_000,
            ..Default::default()
        };
        let (clock, storage, manager) = manager(config);
        let (navigation, messages) = sample_state();

        manager.save_state(&navigation, &messages).await;
        clock.advance(1_001);

        let info = manager.get_storage_info().await;
        assert!(info.exists);
        assert!(info.expired);

        assert!(manager.load_state().await.is_none());
        assert!(storage.peek("linked-panels-state").is_none());
    }

    #[tokio::test]
    async fn test_unbounded_ttl_keeps_snapshot() {
        let config = PersistenceConfig {
            state_ttl_ms: u64::MAX,
            ..Default::default()
        };
        let (clock, storage, manager) = manager(config);
        let (navigation, messages) = sample_state();

        assert!(manager.save_state(&navigation, &messages).await);
        clock.advance(365 * 24 * 60 * 60 * 1000);

        assert!(!manager.get_storage_info().await.expired);
        assert!(manager.load_state().await.is_some());
        assert!(storage.peek("linked-panels-state").is_some());
    }

    #[tokio::test]
    async fn test_malformed_snapshot_is_absent() {
        let (_, storage, manager) = manager(PersistenceConfig::default());
        storage
            .set_item("linked-panels-state", "{not json".to_string())
            .await
            .unwrap();

        assert!(manager.load_state().await.is_none());

        let info = manager.get_storage_info().await;
        assert!(info.exists);
        assert_eq!(info.size_bytes, 9);
        assert!(info.saved_at.is_none());
    }

    #[tokio::test]
    async fn test_unavailable_storage_fails_quietly() {
        let (_, storage, manager) = manager(PersistenceConfig::default());
        let (navigation, messages) = sample_state();
        storage.set_available(false);

        assert!(!manager.save_state(&navigation, &messages).await);
        assert!(manager.load_state().await.is_none());
        assert!(!manager.clear_state().await);
        assert_eq!(manager.get_storage_info().await, StorageInfo::default());
    }

    #[tokio::test]
    async fn test_storage_info_and_clear() {
        let (_, _, manager) = manager(PersistenceConfig::default());
        let (navigation, messages) = sample_state();

        assert!(!manager.get_storage_info().await.exists);
        manager.save_state(&navigation, &messages).await;

        let info = manager.get_storage_info().await;
        assert!(info.exists);
        assert!(info.size_bytes > 0);
        assert_eq!(info.saved_at, Some(1_000_000));
        assert_eq!(info.version.as_deref(), Some(SNAPSHOT_VERSION));
        assert!(!info.expired);

        assert!(manager.clear_state().await);
        assert!(!manager.get_storage_info().await.exists);
    }

    #[tokio::test]
    async fn test_auto_save_debounces_writes() {
        let config = PersistenceConfig {
            auto_save_debounce_ms: 30,
            ..Default::default()
        };
        let (_, storage, mut manager) = manager(config);
        let (mut navigation, messages) = sample_state();

        for index in 0..5 {
            navigation.insert("main".to_string(), PanelNavigation { current_index: index });
            assert!(manager.schedule_auto_save(&navigation, &messages));
        }
        assert!(manager.has_pending_save());

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(storage.write_count(), 1);
        let loaded = manager.load_state().await.unwrap();
        assert_eq!(loaded.panel_navigation["main"].current_index, 4);
    }

    #[tokio::test]
    async fn test_cancel_pending_prevents_write() {
        let config = PersistenceConfig {
            auto_save_debounce_ms: 30,
            ..Default::default()
        };
        let (_, storage, mut manager) = manager(config);
        let (navigation, messages) = sample_state();

        manager.schedule_auto_save(&navigation, &messages);
        assert!(manager.cancel_pending());
        assert!(!manager.cancel_pending());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(storage.write_count(), 0);
    }

    #[tokio::test]
    async fn test_auto_save_disabled() {
        let config = PersistenceConfig {
            auto_save: false,
            ..Default::default()
        };
        let (_, _, mut manager) = manager(config);
        let (navigation, messages) = sample_state();

        assert!(!manager.schedule_auto_save(&navigation, &messages));
        assert!(!manager.has_pending_save());
    }

    #[test]
    fn test_schedule_without_runtime_is_skipped() {
        let (_, _, mut manager) = manager(PersistenceConfig::default());
        let (navigation, messages) = sample_state();

        assert!(!manager.schedule_auto_save(&navigation, &messages));
    }
}
