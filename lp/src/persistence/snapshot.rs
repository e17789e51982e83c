//! Stored snapshot format

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::PanelNavigation;
use crate::messaging::Message;

/// Version written into every snapshot
pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// Navigation and messages as written to storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    #[serde(default)]
    pub panel_navigation: BTreeMap<String, PanelNavigation>,

    #[serde(default)]
    pub resource_messages: HashMap<String, Vec<Message>>,

    /// Unix milliseconds
    pub saved_at: i64,

    pub version: String,
}

impl PersistedSnapshot {
    /// True when the snapshot is older than `ttl_ms`
    pub fn is_expired(&self, now_ms: i64, ttl_ms: u64) -> bool {
        ttl_elapsed(now_ms, self.saved_at, ttl_ms)
    }

    pub fn message_count(&self) -> usize {
        self.resource_messages.values().map(Vec::len).sum()
    }
}

pub(crate) fn ttl_elapsed(now_ms: i64, saved_at: i64, ttl_ms: u64) -> bool {
    u64::try_from(now_ms.saturating_sub(saved_at)).is_ok_and(|age| age > ttl_ms)
}

/// Header fields only; message bodies are skipped
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SnapshotHeader {
    pub saved_at: i64,
    pub version: String,
}

/// Summary of what is currently stored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub exists: bool,
    pub size_bytes: usize,
    pub saved_at: Option<i64>,
    pub version: Option<String>,
    pub expired: bool,
}
