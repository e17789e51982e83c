//! Persistence configuration

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::messaging::{Lifecycle, Message};
use crate::storage::StorageAdapter;

/// Default storage key for snapshots
pub const DEFAULT_STORAGE_KEY: &str = "linked-panels-state";

/// Predicate deciding which messages are written to storage
pub type MessageFilter = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

/// Serializable persistence settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceConfig {
    /// Key the snapshot is stored under
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Include messages in snapshots
    #[serde(default = "default_enabled")]
    pub persist_messages: bool,

    /// Include panel navigation in snapshots
    #[serde(default = "default_enabled")]
    pub persist_navigation: bool,

    /// Save automatically after navigation and message changes
    #[serde(default = "default_enabled")]
    pub auto_save: bool,

    /// Quiet period before an automatic save is written
    #[serde(default = "default_auto_save_debounce_ms")]
    pub auto_save_debounce_ms: u64,

    /// Snapshots older than this are ignored on load (7 days default)
    #[serde(default = "default_state_ttl_ms")]
    pub state_ttl_ms: u64,
}

fn default_storage_key() -> String {
    debug!("default_storage_key: called");
    DEFAULT_STORAGE_KEY.to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_auto_save_debounce_ms() -> u64 {
    debug!("default_auto_save_debounce_ms: called");
    1000
}

fn default_state_ttl_ms() -> u64 {
    debug!("default_state_ttl_ms: called");
    7 * 24 * 60 * 60 * 1000
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        debug!("PersistenceConfig::default: called");
        Self {
            storage_key: default_storage_key(),
            persist_messages: true,
            persist_navigation: true,
            auto_save: true,
            auto_save_debounce_ms: default_auto_save_debounce_ms(),
            state_ttl_ms: default_state_ttl_ms(),
        }
    }
}

impl PersistenceConfig {
    pub fn auto_save_debounce(&self) -> Duration {
        Duration::from_millis(self.auto_save_debounce_ms)
    }

    pub fn state_ttl(&self) -> Duration {
        Duration::from_millis(self.state_ttl_ms)
    }
}

/// Default policy: only state messages survive a restart
pub fn default_message_filter(message: &Message) -> bool {
    message.lifecycle() == Lifecycle::State
}

/// Settings plus the storage backend and message filter
#[derive(Clone)]
pub struct PersistenceOptions {
    pub config: PersistenceConfig,
    pub storage: Arc<dyn StorageAdapter>,
    pub message_filter: Option<MessageFilter>,
}

impl PersistenceOptions {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self {
            config: PersistenceConfig::default(),
            storage,
            message_filter: None,
        }
    }

    pub fn with_config(mut self, config: PersistenceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_message_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        self.message_filter = Some(Arc::new(filter));
        self
    }

    /// Whether a message is eligible for persistence
    pub fn should_persist(&self, message: &Message) -> bool {
        match &self.message_filter {
            Some(filter) => filter(message),
            None => default_message_filter(message),
        }
    }
}

impl fmt::Debug for PersistenceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceOptions")
            .field("config", &self.config)
            .field("message_filter", &self.message_filter.is_some())
            .finish_non_exhaustive()
    }
}
