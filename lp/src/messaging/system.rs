//! MessagingSystem - per-resource message collections and lifecycle rules
//!
//! Pure in-memory logic with no knowledge of panels. Reads never mutate:
//! expired events are filtered at read time and only dropped from storage
//! when the owning collection is next written.

use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use super::content::{Lifecycle, Message, MessageContent};
use crate::clock::SharedClock;

/// Owns the canonical message state for every known resource
pub struct MessagingSystem {
    clock: SharedClock,
    /// Broadcast recipients, in configuration order
    known_resources: Vec<String>,
    /// Messages per target resource in insertion order
    collections: HashMap<String, Vec<Message>>,
    last_timestamp: i64,
}

impl MessagingSystem {
    pub fn new(clock: SharedClock) -> Self {
        debug!("MessagingSystem::new: called");
        Self {
            clock,
            known_resources: Vec::new(),
            collections: HashMap::new(),
            last_timestamp: 0,
        }
    }

    /// Replace the set of resources that broadcasts reach
    ///
    /// Collections of resources that are no longer known are dropped.
    pub fn set_known_resources(&mut self, resource_ids: impl IntoIterator<Item = String>) {
        self.known_resources = resource_ids.into_iter().collect();
        let known = &self.known_resources;
        self.collections.retain(|id, _| known.contains(id));
        debug!(count = self.known_resources.len(), "MessagingSystem::set_known_resources: updated");
    }

    pub fn known_resources(&self) -> &[String] {
        &self.known_resources
    }

    /// Send content from one resource to another, or to everyone else when `to` is `None`
    ///
    /// A broadcast is a single logical message: every recipient stores a copy
    /// with the same id, so consuming it once consumes it everywhere.
    pub fn send_message(&mut self, content: MessageContent, from: &str, to: Option<&str>) -> Message {
        debug!(
            %from,
            ?to,
            message_type = %content.message_type(),
            lifecycle = %content.lifecycle(),
            "MessagingSystem::send_message: called"
        );
        let message = Message {
            id: Uuid::now_v7().to_string(),
            timestamp: self.next_timestamp(),
            from_resource_id: from.to_string(),
            to_resource_id: to.map(str::to_string),
            content,
        };

        let targets: Vec<String> = match to {
            Some(target) => vec![target.to_string()],
            None => self
                .known_resources
                .iter()
                .filter(|id| id.as_str() != from)
                .cloned()
                .collect(),
        };

        if targets.is_empty() {
            debug!("MessagingSystem::send_message: broadcast has no recipients");
        }

        for target in &targets {
            self.deliver(target, message.clone());
        }

        message
    }

    /// Append a message to a target collection, applying supersession
    fn deliver(&mut self, target: &str, message: Message) {
        let now = self.clock.now_ms();
        let collection = self.collections.entry(target.to_string()).or_default();

        collection.retain(|m| !m.is_expired(now));

        if let Some(state_key) = message.content.state_key() {
            let before = collection.len();
            collection.retain(|m| !m.holds_state(state_key));
            if collection.len() < before {
                debug!(%target, %state_key, "MessagingSystem::deliver: superseded previous state");
            }
        }

        collection.push(message);
    }

    fn next_timestamp(&mut self) -> i64 {
        let timestamp = self.clock.now_ms().max(self.last_timestamp);
        self.last_timestamp = timestamp;
        timestamp
    }

    /// Currently valid messages for a resource, newest first
    pub fn get_messages(&self, resource_id: &str) -> Vec<Message> {
        debug!(%resource_id, "MessagingSystem::get_messages: called");
        let now = self.clock.now_ms();
        let Some(collection) = self.collections.get(resource_id) else {
            return Vec::new();
        };

        // Reverse first so the stable sort keeps later insertions ahead on equal timestamps
        let mut messages: Vec<Message> = collection.iter().rev().filter(|m| !m.is_expired(now)).cloned().collect();
        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        messages
    }

    /// The retained state message for `state_key`, if any
    pub fn get_current_state(&self, resource_id: &str, state_key: &str) -> Option<Message> {
        debug!(%resource_id, %state_key, "MessagingSystem::get_current_state: called");
        self.collections
            .get(resource_id)?
            .iter()
            .rev()
            .find(|m| m.holds_state(state_key))
            .cloned()
    }

    /// Remove the retained state message for `state_key`
    pub fn clear_state(&mut self, resource_id: &str, state_key: &str) -> bool {
        debug!(%resource_id, %state_key, "MessagingSystem::clear_state: called");
        let Some(collection) = self.collections.get_mut(resource_id) else {
            return false;
        };
        let before = collection.len();
        collection.retain(|m| !m.holds_state(state_key));
        collection.len() < before
    }

    /// Consume an event by id; unknown or already consumed ids are a no-op
    pub fn consume_event(&mut self, message_id: &str) -> bool {
        debug!(%message_id, "MessagingSystem::consume_event: called");
        self.consume(message_id, Lifecycle::Event)
    }

    /// Consume a command by id; unknown or already consumed ids are a no-op
    pub fn consume_command(&mut self, message_id: &str) -> bool {
        debug!(%message_id, "MessagingSystem::consume_command: called");
        self.consume(message_id, Lifecycle::Command)
    }

    fn consume(&mut self, message_id: &str, lifecycle: Lifecycle) -> bool {
        let mut consumed = false;
        for collection in self.collections.values_mut() {
            let before = collection.len();
            collection.retain(|m| !(m.id == message_id && m.lifecycle() == lifecycle));
            consumed |= collection.len() < before;
        }

        if !consumed {
            debug!(%message_id, %lifecycle, "MessagingSystem::consume: nothing to consume");
        }
        consumed
    }

    /// Remove every message addressed to a resource, returning how many were removed
    pub fn clear_messages(&mut self, resource_id: &str) -> usize {
        debug!(%resource_id, "MessagingSystem::clear_messages: called");
        self.collections.remove(resource_id).map(|c| c.len()).unwrap_or(0)
    }

    /// Number of retained (not expired) messages for a resource
    pub fn message_count(&self, resource_id: &str) -> usize {
        let now = self.clock.now_ms();
        self.collections
            .get(resource_id)
            .map(|c| c.iter().filter(|m| !m.is_expired(now)).count())
            .unwrap_or(0)
    }

    /// Copy of every collection with expired events removed, in insertion order
    pub fn snapshot(&self) -> HashMap<String, Vec<Message>> {
        let now = self.clock.now_ms();
        self.collections
            .iter()
            .map(|(id, messages)| {
                let live: Vec<Message> = messages.iter().filter(|m| !m.is_expired(now)).cloned().collect();
                (id.clone(), live)
            })
            .filter(|(_, messages)| !messages.is_empty())
            .collect()
    }

    /// Replace collections with previously captured messages
    ///
    /// Messages for unknown resources are skipped and state supersession is
    /// re-applied in timestamp order.
    pub fn load_messages(&mut self, messages: HashMap<String, Vec<Message>>) -> usize {
        debug!(resources = messages.len(), "MessagingSystem::load_messages: called");
        let mut loaded = 0;

        for (resource_id, mut incoming) in messages {
            if !self.known_resources.contains(&resource_id) {
                warn!(%resource_id, "Skipping stored messages for unknown resource");
                continue;
            }

            incoming.sort_by_key(|m| m.timestamp);
            self.collections.remove(&resource_id);
            for message in incoming {
                self.last_timestamp = self.last_timestamp.max(message.timestamp);
                self.deliver(&resource_id, message);
            }
            loaded += self.collections.get(&resource_id).map(|c| c.len()).unwrap_or(0);
        }

        loaded
    }

    /// Merge previously captured messages into the live collections
    ///
    /// Live messages are kept. A stored message is skipped when its id is
    /// already present, when it has expired, or when the target already holds
    /// a state for the same key that is at least as new. Returns how many
    /// stored messages were merged.
    pub fn merge_messages(&mut self, messages: HashMap<String, Vec<Message>>) -> usize {
        debug!(resources = messages.len(), "MessagingSystem::merge_messages: called");
        let now = self.clock.now_ms();
        let mut merged = 0;

        for (resource_id, mut incoming) in messages {
            if !self.known_resources.contains(&resource_id) {
                warn!(%resource_id, "Skipping stored messages for unknown resource");
                continue;
            }

            incoming.sort_by_key(|m| m.timestamp);
            let collection = self.collections.entry(resource_id.clone()).or_default();
            collection.retain(|m| !m.is_expired(now));

            for message in incoming {
                if message.is_expired(now) || collection.iter().any(|m| m.id == message.id) {
                    continue;
                }

                if let Some(state_key) = message.content.state_key() {
                    if collection
                        .iter()
                        .any(|m| m.holds_state(state_key) && m.timestamp >= message.timestamp)
                    {
                        debug!(%resource_id, %state_key, "MessagingSystem::merge_messages: live state is newer");
                        continue;
                    }
                    collection.retain(|m| !m.holds_state(state_key));
                }

                // Ahead of live messages with the same timestamp so they stay newest
                let position = collection.partition_point(|m| m.timestamp < message.timestamp);
                self.last_timestamp = self.last_timestamp.max(message.timestamp);
                collection.insert(position, message);
                merged += 1;
            }
        }

        merged
    }
}
