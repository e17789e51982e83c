//! Lifecycle-aware messaging between resources
//!
//! Every message carries one of three lifecycles:
//! - **State:** retained per `(target, stateKey)`, a newer send supersedes the old one
//! - **Event:** one-shot, removed on consumption or when its TTL elapses
//! - **Command:** one-shot, removed on consumption

mod content;
mod handler;
mod system;

pub use content::{ContentError, Lifecycle, Message, MessageContent};
pub use handler::{MessageTypeHandler, MessageTypeRegistry};
pub use system::MessagingSystem;
