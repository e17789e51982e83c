//! Snapshot persistence for navigation and message state
//!
//! What gets persisted (flags and message filter) is decided here; how it is
//! stored is left to a [`StorageAdapter`](crate::storage::StorageAdapter).

mod config;
mod manager;
mod snapshot;

pub use config::{DEFAULT_STORAGE_KEY, MessageFilter, PersistenceConfig, PersistenceOptions, default_message_filter};
pub use manager::PersistenceManager;
pub use snapshot::{PersistedSnapshot, SNAPSHOT_VERSION, StorageInfo};
