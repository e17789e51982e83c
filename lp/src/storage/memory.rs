//! In-memory storage backend

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::debug;

use super::{StorageAdapter, StorageError};

/// Process-local storage, mainly for tests and ephemeral sessions
#[derive(Debug)]
pub struct MemoryStorageAdapter {
    items: Mutex<HashMap<String, String>>,
    available: AtomicBool,
    writes: AtomicUsize,
}

impl Default for MemoryStorageAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorageAdapter {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            writes: AtomicUsize::new(0),
        }
    }

    /// Simulate the backend going away (or coming back)
    pub fn set_available(&self, available: bool) {
        debug!(%available, "MemoryStorageAdapter::set_available: called");
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of successful `set_item` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw stored value, bypassing availability
    pub fn peek(&self, key: &str) -> Option<String> {
        self.items.lock().ok()?.get(key).cloned()
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable)
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.items
            .lock()
            .map_err(|_| StorageError::Io("memory storage lock poisoned".to_string()))
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorageAdapter {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        debug!(%key, "MemoryStorageAdapter::get_item: called");
        self.check_available()?;
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        debug!(%key, bytes = value.len(), "MemoryStorageAdapter::set_item: called");
        self.check_available()?;
        self.lock()?.insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        debug!(%key, "MemoryStorageAdapter::remove_item: called");
        self.check_available()?;
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let storage = MemoryStorageAdapter::new();

        assert!(storage.get_item("k").await.unwrap().is_none());
        storage.set_item("k", "v".to_string()).await.unwrap();
        assert_eq!(storage.get_item("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(storage.write_count(), 1);

        storage.remove_item("k").await.unwrap();
        assert!(storage.get_item("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_backend_errors() {
        let storage = MemoryStorageAdapter::new();
        storage.set_item("k", "v".to_string()).await.unwrap();
        storage.set_available(false);

        assert!(!storage.is_available().await);
        assert!(matches!(storage.get_item("k").await, Err(StorageError::Unavailable)));
        assert!(storage.set_item("k", "w".to_string()).await.is_err());
        assert_eq!(storage.peek("k"), Some("v".to_string()));
    }
}
