use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{CoordinationError, CoordinationResult};
use crate::messaging::{Message, MessageContent};
use crate::store::CoordinationStore;

/// Messaging on behalf of one resource; the resource is always the sender
pub struct MessagingApi<'a> {
    store: &'a mut CoordinationStore,
    resource_id: &'a str,
}

impl<'a> MessagingApi<'a> {
    pub(crate) fn new(store: &'a mut CoordinationStore, resource_id: &'a str) -> Self {
        Self { store, resource_id }
    }

    /// Send to one resource
    pub fn send(&mut self, target_id: &str, content: MessageContent) -> CoordinationResult<Message> {
        debug!(from = %self.resource_id, %target_id, "MessagingApi::send: called");
        self.store.send_message(content, self.resource_id, Some(target_id))
    }

    /// Send loosely-typed JSON content to one resource
    pub fn send_raw(&mut self, target_id: &str, content: Value) -> CoordinationResult<Message> {
        self.store.send_raw(content, self.resource_id, Some(target_id))
    }

    /// Broadcast to every other resource; returns how many were messaged
    pub fn send_to_all(&mut self, content: MessageContent) -> CoordinationResult<usize> {
        debug!(from = %self.resource_id, "MessagingApi::send_to_all: called");
        let message = self.store.send_message(content, self.resource_id, None)?;
        let recipients = self
            .store
            .get_all_resource_ids()
            .iter()
            .filter(|id| id.as_str() != self.resource_id)
            .count();
        info!(message_id = %message.id, from = %self.resource_id, recipients, "Broadcast sent");
        Ok(recipients)
    }

    /// Send a copy to each other resource of a panel; returns how many were messaged
    pub fn send_to_panel(&mut self, panel_id: &str, content: MessageContent) -> CoordinationResult<usize> {
        debug!(from = %self.resource_id, %panel_id, "MessagingApi::send_to_panel: called");
        if !self.store.has_resource(self.resource_id) {
            let err = CoordinationError::UnknownSender(self.resource_id.to_string());
            warn!(error = %err, "Cannot send to panel");
            return Err(err);
        }

        let Some(panel) = self.store.panel(panel_id) else {
            let err = CoordinationError::PanelNotFound(panel_id.to_string());
            warn!(error = %err, "Cannot send to panel");
            return Err(err);
        };

        let mut recipients: Vec<String> = Vec::new();
        for id in &panel.resource_ids {
            if id != self.resource_id && !recipients.contains(id) && self.store.has_resource(id) {
                recipients.push(id.clone());
            }
        }

        for target_id in &recipients {
            self.store
                .send_message(content.clone(), self.resource_id, Some(target_id))?;
        }
        info!(from = %self.resource_id, %panel_id, recipients = recipients.len(), "Panel message sent");
        Ok(recipients.len())
    }

    /// Messages addressed to this resource, newest first
    pub fn get_messages(&self) -> Vec<Message> {
        self.store.get_messages(self.resource_id)
    }

    pub fn clear_messages(&mut self) -> CoordinationResult<usize> {
        self.store.clear_messages(self.resource_id)
    }

    pub fn get_current_state(&self, state_key: &str) -> Option<Message> {
        self.store.get_current_state(self.resource_id, state_key)
    }

    pub fn clear_state(&mut self, state_key: &str) -> bool {
        self.store.clear_state(self.resource_id, state_key)
    }

    pub fn consume_event(&mut self, message_id: &str) -> bool {
        self.store.consume_event(message_id)
    }

    pub fn consume_command(&mut self, message_id: &str) -> bool {
        self.store.consume_command(message_id)
    }
}
