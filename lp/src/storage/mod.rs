//! Key-value storage contract used by the persistence layer
//!
//! Backends (browser storage, databases, HTTP services) live outside this
//! crate and implement [`StorageAdapter`]. Values are opaque JSON strings
//! owned by the persistence manager.

mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStorageAdapter;

/// Errors a storage backend may report
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage backend unavailable")]
    Unavailable,

    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Minimal key-value contract a storage backend must satisfy
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Whether the backend can currently be used
    async fn is_available(&self) -> bool;

    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError>;

    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}
