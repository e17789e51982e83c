//! LinkedPanels - coordination core for multi-panel resource layouts
//!
//! A layout is a set of addressable resources arranged into named panels.
//! Each panel shows one resource at a time and can be navigated; resources
//! talk to each other through lifecycle-aware messages.
//!
//! # Core Concepts
//!
//! - **Resources** are identified by id and do not know which panels show them
//! - **Panels** are ordered, navigable sequences of resource ids with a current index
//! - **Messages** carry a lifecycle: `state` is retained until superseded,
//!   `event` is one-shot with optional TTL, `command` is one-shot
//! - **Persistence** snapshots navigation and messages through a pluggable
//!   [`StorageAdapter`], debouncing automatic saves
//!
//! # Modules
//!
//! - [`store`] - The coordination store (registry, navigation, message wiring)
//! - [`api`] - Resource-scoped facade: navigation, messaging, system
//! - [`messaging`] - Message content, lifecycle rules, type handlers
//! - [`persistence`] - Snapshot save/load with debounced auto-save
//! - [`storage`] - Storage adapter contract and in-memory adapter
//! - [`config`] - Layout configuration types and loading
//! - [`cli`] - Command-line interface for the `lp` binary
//!
//! # Example
//!
//! ```ignore
//! use linkedpanels::{CoordinationStore, LayoutConfig, MessageContent, PanelConfig, Resource};
//!
//! let mut store = CoordinationStore::new();
//! store.set_config(
//!     LayoutConfig::new()
//!         .with_resource(Resource::new("a"))
//!         .with_resource(Resource::new("b"))
//!         .with_panel("main", PanelConfig::new(["a", "b"])),
//! );
//!
//! let mut api = store.resource_api("a");
//! api.messaging().send("b", MessageContent::state("hl", "highlight").with("value", "x"))?;
//! ```

pub mod api;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod messaging;
pub mod persistence;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use api::{MessagingApi, NavigationApi, ResourceApi, SystemApi};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{ConfigIssue, InitialState, LayoutConfig, PanelConfig, PanelNavigation, Resource};
pub use error::{CoordinationError, CoordinationResult};
pub use messaging::{Lifecycle, Message, MessageContent, MessageTypeHandler, MessageTypeRegistry, MessagingSystem};
pub use persistence::{PersistedSnapshot, PersistenceConfig, PersistenceManager, PersistenceOptions, StorageInfo};
pub use storage::{MemoryStorageAdapter, StorageAdapter, StorageError};
pub use store::{CoordinationStore, ResourceInfo, StoreEvent};
