use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{CoordinationError, CoordinationResult};
use crate::store::CoordinationStore;

/// Panel navigation on behalf of one resource
pub struct NavigationApi<'a> {
    store: &'a mut CoordinationStore,
    resource_id: &'a str,
}

impl<'a> NavigationApi<'a> {
    pub(crate) fn new(store: &'a mut CoordinationStore, resource_id: &'a str) -> Self {
        Self { store, resource_id }
    }

    /// Bring a resource into view in the first panel that holds it
    ///
    /// Returns the panel that moved.
    pub fn go_to_resource(&mut self, target_id: &str) -> CoordinationResult<String> {
        debug!(from = %self.resource_id, %target_id, "NavigationApi::go_to_resource: called");
        let Some(panel_id) = self.store.get_resource_panel(target_id) else {
            let err = CoordinationError::ResourceNotFound(target_id.to_string());
            warn!(error = %err, "Resource is not shown in any panel");
            return Err(err);
        };
        self.store.set_panel_resource_by_id(&panel_id, target_id)?;
        Ok(panel_id)
    }

    /// Move a panel to an index, clamped into the panel's bounds
    pub fn go_to_panel(&mut self, panel_id: &str, index: i64) -> CoordinationResult<usize> {
        debug!(from = %self.resource_id, %panel_id, %index, "NavigationApi::go_to_panel: called");
        self.store.set_current_resource(panel_id, index)
    }

    pub fn go_to_resource_in_panel(&mut self, panel_id: &str, target_id: &str) -> CoordinationResult<usize> {
        debug!(from = %self.resource_id, %panel_id, %target_id, "NavigationApi::go_to_resource_in_panel: called");
        self.store.set_panel_resource_by_id(panel_id, target_id)
    }

    /// Step the calling resource's own panel forward
    pub fn next(&mut self) -> CoordinationResult<usize> {
        let panel_id = self.my_panel_or_err()?;
        self.store.next_resource(&panel_id)
    }

    /// Step the calling resource's own panel back
    pub fn previous(&mut self) -> CoordinationResult<usize> {
        let panel_id = self.my_panel_or_err()?;
        self.store.previous_resource(&panel_id)
    }

    pub fn get_my_panel(&self) -> Option<String> {
        self.store.get_resource_panel(self.resource_id)
    }

    /// The resource currently shown in each panel
    pub fn get_visible_resources(&self) -> BTreeMap<String, String> {
        self.store.get_visible_resources_per_panel()
    }

    fn my_panel_or_err(&self) -> CoordinationResult<String> {
        self.get_my_panel().ok_or_else(|| {
            let err = CoordinationError::ResourceNotFound(self.resource_id.to_string());
            warn!(error = %err, "Calling resource is not shown in any panel");
            err
        })
    }
}
