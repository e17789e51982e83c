//! CoordinationStore - resource registry, panel navigation and message wiring
//!
//! Single-writer: every command takes `&mut self` and completes before the
//! next one starts. Persistence runs off to the side through the
//! [`PersistenceManager`] debounce task and never blocks a command.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::events::{DEFAULT_EVENT_CAPACITY, EventPublisher, StoreEvent};
use super::info::ResourceInfo;
use crate::clock::{SharedClock, system_clock};
use crate::config::{LayoutConfig, PanelConfig, PanelNavigation, Resource};
use crate::error::{CoordinationError, CoordinationResult};
use crate::messaging::{Message, MessageContent, MessageTypeHandler, MessageTypeRegistry, MessagingSystem};
use crate::persistence::{PersistenceManager, PersistenceOptions, StorageInfo};

/// Central state container for linked panels
pub struct CoordinationStore {
    clock: SharedClock,
    /// Registry in configuration order
    resources: Vec<Resource>,
    panels: BTreeMap<String, PanelConfig>,
    /// Current index per panel
    navigation: BTreeMap<String, usize>,
    messaging: MessagingSystem,
    handlers: MessageTypeRegistry,
    persistence: Option<PersistenceManager>,
    /// The last layout carried explicit navigation, so persisted navigation is ignored
    navigation_overridden: bool,
    /// The last layout carried explicit messages, so persisted messages are ignored
    messages_seeded: bool,
    events: EventPublisher,
}

impl Default for CoordinationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinationStore {
    /// Create an empty store using the system clock
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Create an empty store with an explicit time source
    pub fn with_clock(clock: SharedClock) -> Self {
        debug!("CoordinationStore::with_clock: called");
        Self {
            messaging: MessagingSystem::new(clock.clone()),
            clock,
            resources: Vec::new(),
            panels: BTreeMap::new(),
            navigation: BTreeMap::new(),
            handlers: MessageTypeRegistry::new(),
            persistence: None,
            navigation_overridden: false,
            messages_seeded: false,
            events: EventPublisher::new(DEFAULT_EVENT_CAPACITY),
        }
    }

    /// Enable persistence through the given options
    pub fn with_persistence(mut self, options: PersistenceOptions) -> Self {
        info!(storage_key = %options.config.storage_key, "Persistence enabled");
        self.persistence = Some(PersistenceManager::new(options, self.clock.clone()));
        self
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Register a validator/handler for one message type
    pub fn register_handler(&mut self, handler: Box<dyn MessageTypeHandler>) {
        if let Some(previous) = self.handlers.register(handler) {
            debug!(message_type = %previous.message_type(), "CoordinationStore::register_handler: replaced handler");
        }
    }

    pub fn handlers(&self) -> &MessageTypeRegistry {
        &self.handlers
    }

    // === Configuration ===

    /// Replace the resource registry and panels wholesale
    ///
    /// Each panel starts at the explicit navigation override if one is given,
    /// otherwise at its `initialIndex`, its `initialResourceId`, or 0.
    /// Persisted navigation is applied later by
    /// [`restore_persisted_state`](Self::restore_persisted_state).
    pub fn set_config(&mut self, config: LayoutConfig) {
        debug!(
            resources = config.resources.len(),
            panels = config.panels.len(),
            "CoordinationStore::set_config: called"
        );

        for issue in config.validate() {
            warn!(%issue, "Layout issue");
        }

        let LayoutConfig {
            resources,
            panels,
            initial_state,
        } = config;

        let mut registry: Vec<Resource> = Vec::with_capacity(resources.len());
        for resource in resources {
            if !registry.iter().any(|r| r.id == resource.id) {
                registry.push(resource);
            }
        }

        let (navigation_override, initial_messages) = match initial_state {
            Some(state) => (state.panel_navigation, state.resource_messages),
            None => (None, None),
        };

        let navigation = panels
            .iter()
            .map(|(panel_id, panel)| {
                let index = navigation_override
                    .as_ref()
                    .and_then(|overrides| overrides.get(panel_id))
                    .map(|nav| panel.clamp_index(nav.current_index as i64))
                    .unwrap_or_else(|| panel.initial_position());
                (panel_id.clone(), index)
            })
            .collect();

        self.resources = registry;
        self.panels = panels;
        self.navigation = navigation;
        self.navigation_overridden = navigation_override.is_some();
        self.messaging
            .set_known_resources(self.resources.iter().map(|r| r.id.clone()));

        self.messages_seeded = initial_messages.is_some();
        if let Some(messages) = initial_messages {
            let loaded = self.messaging.load_messages(messages);
            debug!(loaded, "CoordinationStore::set_config: seeded initial messages");
        }

        info!(
            resources = self.resources.len(),
            panels = self.panels.len(),
            "Layout applied"
        );
        self.events.emit(StoreEvent::ConfigApplied {
            resources: self.resources.len(),
            panels: self.panels.len(),
        });
    }

    /// Apply previously persisted navigation and messages
    ///
    /// Navigation is skipped when the current layout supplied an explicit
    /// override, and messages when it supplied initial messages. Persisted
    /// messages are merged into the live ones, so anything sent since
    /// `set_config` survives and newer live state is not replaced. Returns
    /// whether a persisted snapshot was found.
    pub async fn restore_persisted_state(&mut self) -> bool {
        debug!("CoordinationStore::restore_persisted_state: called");
        let Some(persistence) = &self.persistence else {
            return false;
        };
        let Some(snapshot) = persistence.load_state().await else {
            return false;
        };

        let mut panels_restored = 0;
        if self.navigation_overridden {
            debug!("CoordinationStore::restore_persisted_state: explicit navigation wins");
        } else {
            for (panel_id, nav) in &snapshot.panel_navigation {
                match self.panels.get(panel_id) {
                    Some(panel) => {
                        let index = panel.clamp_index(nav.current_index as i64);
                        self.navigation.insert(panel_id.clone(), index);
                        panels_restored += 1;
                    }
                    None => debug!(%panel_id, "Ignoring persisted navigation for unknown panel"),
                }
            }
        }

        let mut messages_restored = 0;
        if !self.messages_seeded && !snapshot.resource_messages.is_empty() {
            messages_restored = self.messaging.merge_messages(snapshot.resource_messages);
        }

        info!(panels_restored, messages_restored, "Persisted state restored");
        self.events.emit(StoreEvent::StateRestored {
            panels: panels_restored,
            messages: messages_restored,
        });
        true
    }

    // === Navigation ===

    /// Move a panel to `index`, clamped into the panel's bounds
    pub fn set_current_resource(&mut self, panel_id: &str, index: i64) -> CoordinationResult<usize> {
        debug!(%panel_id, %index, "CoordinationStore::set_current_resource: called");
        self.navigate(panel_id, |_| index)
    }

    /// Advance a panel by one; stays put at the last resource
    pub fn next_resource(&mut self, panel_id: &str) -> CoordinationResult<usize> {
        debug!(%panel_id, "CoordinationStore::next_resource: called");
        self.navigate(panel_id, |current| current as i64 + 1)
    }

    /// Step a panel back by one; stays put at the first resource
    pub fn previous_resource(&mut self, panel_id: &str) -> CoordinationResult<usize> {
        debug!(%panel_id, "CoordinationStore::previous_resource: called");
        self.navigate(panel_id, |current| current as i64 - 1)
    }

    /// Show a specific resource in a panel
    pub fn set_panel_resource_by_id(&mut self, panel_id: &str, resource_id: &str) -> CoordinationResult<usize> {
        debug!(%panel_id, %resource_id, "CoordinationStore::set_panel_resource_by_id: called");
        let Some(panel) = self.panels.get(panel_id) else {
            return Err(usage_error(CoordinationError::PanelNotFound(panel_id.to_string())));
        };

        match panel.position_of(resource_id) {
            Some(position) => self.navigate(panel_id, |_| position as i64),
            None if self.has_resource(resource_id) => Err(usage_error(CoordinationError::ResourceNotInPanel {
                resource_id: resource_id.to_string(),
                panel_id: panel_id.to_string(),
            })),
            None => Err(usage_error(CoordinationError::ResourceNotFound(resource_id.to_string()))),
        }
    }

    fn navigate(&mut self, panel_id: &str, target: impl FnOnce(usize) -> i64) -> CoordinationResult<usize> {
        let Some(panel) = self.panels.get(panel_id) else {
            return Err(usage_error(CoordinationError::PanelNotFound(panel_id.to_string())));
        };
        if panel.resource_ids.is_empty() {
            return Err(usage_error(CoordinationError::EmptyPanel(panel_id.to_string())));
        }

        let current = self.navigation.get(panel_id).copied().unwrap_or(0);
        let index = panel.clamp_index(target(current));
        if index == current {
            debug!(%panel_id, %index, "CoordinationStore::navigate: already there");
            return Ok(index);
        }

        let resource_id = panel.resource_ids.get(index).cloned();
        self.navigation.insert(panel_id.to_string(), index);
        debug!(%panel_id, from = current, to = index, "CoordinationStore::navigate: moved");

        self.events.emit(StoreEvent::NavigationChanged {
            panel_id: panel_id.to_string(),
            index,
            resource_id,
        });
        self.schedule_save();
        Ok(index)
    }

    /// Current index of a panel
    pub fn current_index(&self, panel_id: &str) -> Option<usize> {
        self.navigation.get(panel_id).copied()
    }

    /// Navigation of every panel in persisted form
    pub fn navigation_state(&self) -> BTreeMap<String, PanelNavigation> {
        self.navigation
            .iter()
            .map(|(panel_id, index)| (panel_id.clone(), PanelNavigation { current_index: *index }))
            .collect()
    }

    // === Messaging ===

    /// Send typed content from one resource to another, or broadcast when `to` is `None`
    pub fn send_message(
        &mut self,
        content: MessageContent,
        from: &str,
        to: Option<&str>,
    ) -> CoordinationResult<Message> {
        debug!(%from, ?to, message_type = %content.message_type(), "CoordinationStore::send_message: called");
        if !self.has_resource(from) {
            return Err(usage_error(CoordinationError::UnknownSender(from.to_string())));
        }
        if let Some(target) = to
            && !self.has_resource(target)
        {
            return Err(usage_error(CoordinationError::UnknownTarget(target.to_string())));
        }
        if !self.handlers.validate(&content) {
            return Err(usage_error(CoordinationError::Rejected {
                message_type: content.message_type().to_string(),
            }));
        }

        let message = self.messaging.send_message(content, from, to);
        self.handlers.dispatch(&message);

        self.events.emit(StoreEvent::MessageSent {
            message_id: message.id.clone(),
            from_resource_id: message.from_resource_id.clone(),
            to_resource_id: message.to_resource_id.clone(),
            lifecycle: message.lifecycle(),
        });
        self.schedule_save();
        Ok(message)
    }

    /// Send loosely-typed JSON content
    ///
    /// Content that breaks the message contract (a state payload without
    /// `stateKey`, a missing `type`) is dropped with a warning.
    pub fn send_raw(&mut self, content: Value, from: &str, to: Option<&str>) -> CoordinationResult<Message> {
        debug!(%from, ?to, "CoordinationStore::send_raw: called");
        match MessageContent::from_value(content) {
            Ok(content) => self.send_message(content, from, to),
            Err(e) => {
                warn!(%from, ?to, error = %e, "Dropping message that violates the content contract");
                Err(CoordinationError::InvalidContent(e.to_string()))
            }
        }
    }

    /// Valid messages for a resource, newest first
    pub fn get_messages(&self, resource_id: &str) -> Vec<Message> {
        self.messaging.get_messages(resource_id)
    }

    pub fn get_current_state(&self, resource_id: &str, state_key: &str) -> Option<Message> {
        self.messaging.get_current_state(resource_id, state_key)
    }

    pub fn clear_state(&mut self, resource_id: &str, state_key: &str) -> bool {
        let cleared = self.messaging.clear_state(resource_id, state_key);
        if cleared {
            self.events.emit(StoreEvent::MessagesCleared {
                resource_id: resource_id.to_string(),
                count: 1,
            });
            self.schedule_save();
        }
        cleared
    }

    /// Consume an event; repeated or unknown ids are a no-op
    pub fn consume_event(&mut self, message_id: &str) -> bool {
        let consumed = self.messaging.consume_event(message_id);
        self.after_consume(message_id, consumed);
        consumed
    }

    /// Consume a command; repeated or unknown ids are a no-op
    pub fn consume_command(&mut self, message_id: &str) -> bool {
        let consumed = self.messaging.consume_command(message_id);
        self.after_consume(message_id, consumed);
        consumed
    }

    fn after_consume(&mut self, message_id: &str, consumed: bool) {
        if consumed {
            self.events.emit(StoreEvent::MessageConsumed {
                message_id: message_id.to_string(),
            });
            self.schedule_save();
        }
    }

    /// Remove every message addressed to a resource
    pub fn clear_messages(&mut self, resource_id: &str) -> CoordinationResult<usize> {
        debug!(%resource_id, "CoordinationStore::clear_messages: called");
        if !self.has_resource(resource_id) {
            return Err(usage_error(CoordinationError::ResourceNotFound(resource_id.to_string())));
        }

        let count = self.messaging.clear_messages(resource_id);
        if count > 0 {
            self.events.emit(StoreEvent::MessagesCleared {
                resource_id: resource_id.to_string(),
                count,
            });
            self.schedule_save();
        }
        Ok(count)
    }

    /// All live messages keyed by target resource
    pub fn message_snapshot(&self) -> HashMap<String, Vec<Message>> {
        self.messaging.snapshot()
    }

    // === Introspection ===

    pub fn has_resource(&self, resource_id: &str) -> bool {
        self.resources.iter().any(|r| r.id == resource_id)
    }

    pub fn resource(&self, resource_id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == resource_id)
    }

    pub fn panel(&self, panel_id: &str) -> Option<&PanelConfig> {
        self.panels.get(panel_id)
    }

    /// Resource ids in configuration order
    pub fn get_all_resource_ids(&self) -> Vec<String> {
        self.resources.iter().map(|r| r.id.clone()).collect()
    }

    /// First panel (by panel id order) that contains the resource
    pub fn get_resource_panel(&self, resource_id: &str) -> Option<String> {
        self.panels
            .iter()
            .find(|(_, panel)| panel.position_of(resource_id).is_some())
            .map(|(panel_id, _)| panel_id.clone())
    }

    /// The resource currently shown in each non-empty panel
    pub fn get_visible_resources_per_panel(&self) -> BTreeMap<String, String> {
        self.panels
            .iter()
            .filter_map(|(panel_id, panel)| {
                let index = self.navigation.get(panel_id).copied().unwrap_or(0);
                panel
                    .resource_ids
                    .get(index)
                    .map(|resource_id| (panel_id.clone(), resource_id.clone()))
            })
            .collect()
    }

    /// Whether a resource is the current one in any panel
    pub fn is_visible(&self, resource_id: &str) -> bool {
        self.get_visible_resources_per_panel()
            .values()
            .any(|id| id == resource_id)
    }

    pub fn get_all_panels(&self) -> Vec<String> {
        self.panels.keys().cloned().collect()
    }

    /// Resource ids of a panel in navigation order; empty for unknown panels
    pub fn get_resources_in_panel(&self, panel_id: &str) -> Vec<String> {
        self.panels
            .get(panel_id)
            .map(|panel| panel.resource_ids.clone())
            .unwrap_or_default()
    }

    pub fn get_panel_resource_mapping(&self) -> BTreeMap<String, Vec<String>> {
        self.panels
            .iter()
            .map(|(panel_id, panel)| (panel_id.clone(), panel.resource_ids.clone()))
            .collect()
    }

    pub fn get_resource_info(&self, resource_id: &str) -> Option<ResourceInfo> {
        self.resource(resource_id).map(ResourceInfo::from)
    }

    /// Info for each resource of a panel that exists in the registry
    pub fn get_resources_info_in_panel(&self, panel_id: &str) -> Vec<ResourceInfo> {
        self.get_resources_in_panel(panel_id)
            .iter()
            .filter_map(|id| self.get_resource_info(id))
            .collect()
    }

    /// Registry grouped by category; resources without one are "uncategorized"
    pub fn get_resources_by_category(&self) -> BTreeMap<String, Vec<ResourceInfo>> {
        let mut categories: BTreeMap<String, Vec<ResourceInfo>> = BTreeMap::new();
        for resource in &self.resources {
            let info = ResourceInfo::from(resource);
            categories
                .entry(info.category_or_default().to_string())
                .or_default()
                .push(info);
        }
        categories
    }

    // === Persistence ===

    pub fn persistence(&self) -> Option<&PersistenceManager> {
        self.persistence.as_ref()
    }

    fn schedule_save(&mut self) {
        if self.persistence.is_none() {
            return;
        }
        let navigation = self.navigation_state();
        let messages = self.messaging.snapshot();
        if let Some(persistence) = self.persistence.as_mut() {
            persistence.schedule_auto_save(&navigation, &messages);
        }
    }

    /// Cancel any pending debounced save and write the current state now
    pub async fn flush(&mut self) -> bool {
        debug!("CoordinationStore::flush: called");
        let navigation = self.navigation_state();
        let messages = self.messaging.snapshot();
        match self.persistence.as_mut() {
            Some(persistence) => {
                persistence.cancel_pending();
                persistence.save_state(&navigation, &messages).await
            }
            None => false,
        }
    }

    /// Remove the persisted snapshot
    pub async fn clear_persisted_state(&mut self) -> bool {
        match self.persistence.as_mut() {
            Some(persistence) => {
                persistence.cancel_pending();
                persistence.clear_state().await
            }
            None => false,
        }
    }

    pub async fn storage_info(&self) -> Option<StorageInfo> {
        match &self.persistence {
            Some(persistence) => Some(persistence.get_storage_info().await),
            None => None,
        }
    }

    /// Tear the store down, cancelling any save that has not been written yet
    pub fn dispose(mut self) {
        info!("Disposing coordination store");
        if let Some(persistence) = self.persistence.as_mut()
            && persistence.cancel_pending()
        {
            debug!("CoordinationStore::dispose: pending save cancelled");
        }
    }
}

/// Log a usage error before handing it back
fn usage_error(err: CoordinationError) -> CoordinationError {
    warn!(error = %err, "Coordination request ignored");
    err
}
