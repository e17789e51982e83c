//! Message type handlers supplied by the embedding application

use std::collections::HashMap;

use tracing::debug;

use super::content::{Message, MessageContent};

/// Validates and reacts to messages of one `type`
///
/// The store consults the handler registered for a content's type before
/// delivery and notifies it after. Types without a handler pass unchecked.
pub trait MessageTypeHandler: Send + Sync {
    /// The `type` string this handler owns
    fn message_type(&self) -> &str;

    /// Whether content of this type is acceptable
    fn validate(&self, content: &MessageContent) -> bool {
        let _ = content;
        true
    }

    /// Called once per delivered message
    fn handle(&self, message: &Message) {
        let _ = message;
    }
}

/// Handlers keyed by message type
#[derive(Default)]
pub struct MessageTypeRegistry {
    handlers: HashMap<String, Box<dyn MessageTypeHandler>>,
}

impl MessageTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, returning the one it replaced
    pub fn register(&mut self, handler: Box<dyn MessageTypeHandler>) -> Option<Box<dyn MessageTypeHandler>> {
        let message_type = handler.message_type().to_string();
        debug!(%message_type, "MessageTypeRegistry::register: called");
        self.handlers.insert(message_type, handler)
    }

    pub fn unregister(&mut self, message_type: &str) -> Option<Box<dyn MessageTypeHandler>> {
        debug!(%message_type, "MessageTypeRegistry::unregister: called");
        self.handlers.remove(message_type)
    }

    pub fn contains(&self, message_type: &str) -> bool {
        self.handlers.contains_key(message_type)
    }

    /// Registered types, sorted
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Validate content against its handler; unknown types are accepted
    pub fn validate(&self, content: &MessageContent) -> bool {
        match self.handlers.get(content.message_type()) {
            Some(handler) => handler.validate(content),
            None => true,
        }
    }

    /// Notify the handler for a delivered message, if one is registered
    pub fn dispatch(&self, message: &Message) {
        if let Some(handler) = self.handlers.get(message.content.message_type()) {
            handler.handle(message);
        }
    }
}
