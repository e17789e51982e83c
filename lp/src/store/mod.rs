//! Coordination store: registry, navigation and messaging under one writer

mod core;
mod events;
mod info;

pub use self::core::CoordinationStore;
pub use events::{DEFAULT_EVENT_CAPACITY, StoreEvent};
pub use info::{ResourceInfo, UNCATEGORIZED};
