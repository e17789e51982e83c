use std::collections::BTreeMap;

use crate::store::{CoordinationStore, ResourceInfo};

/// Read-only registry and panel queries, global or scoped to the calling resource
pub struct SystemApi<'a> {
    store: &'a CoordinationStore,
    resource_id: &'a str,
}

impl<'a> SystemApi<'a> {
    pub(crate) fn new(store: &'a CoordinationStore, resource_id: &'a str) -> Self {
        Self { store, resource_id }
    }

    // === Scoped ===

    pub fn get_my_info(&self) -> Option<ResourceInfo> {
        self.store.get_resource_info(self.resource_id)
    }

    pub fn get_my_panel(&self) -> Option<String> {
        self.store.get_resource_panel(self.resource_id)
    }

    /// Whether the calling resource is currently shown in any panel
    pub fn is_visible(&self) -> bool {
        self.store.is_visible(self.resource_id)
    }

    /// Resources sharing the calling resource's panel, itself excluded
    pub fn get_panel_neighbors(&self) -> Vec<String> {
        self.get_my_panel()
            .map(|panel_id| {
                self.store
                    .get_resources_in_panel(&panel_id)
                    .into_iter()
                    .filter(|id| id != self.resource_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    // === Global ===

    pub fn get_all_resource_ids(&self) -> Vec<String> {
        self.store.get_all_resource_ids()
    }

    pub fn get_all_panels(&self) -> Vec<String> {
        self.store.get_all_panels()
    }

    pub fn get_resource_panel(&self, resource_id: &str) -> Option<String> {
        self.store.get_resource_panel(resource_id)
    }

    pub fn get_resources_in_panel(&self, panel_id: &str) -> Vec<String> {
        self.store.get_resources_in_panel(panel_id)
    }

    pub fn get_panel_resource_mapping(&self) -> BTreeMap<String, Vec<String>> {
        self.store.get_panel_resource_mapping()
    }

    pub fn get_resource_info(&self, resource_id: &str) -> Option<ResourceInfo> {
        self.store.get_resource_info(resource_id)
    }

    pub fn get_resources_info_in_panel(&self, panel_id: &str) -> Vec<ResourceInfo> {
        self.store.get_resources_info_in_panel(panel_id)
    }

    pub fn get_resources_by_category(&self) -> BTreeMap<String, Vec<ResourceInfo>> {
        self.store.get_resources_by_category()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{LayoutConfig, PanelConfig, Resource};
    use crate::store::CoordinationStore;

    #[test]
    fn test_scoped_queries() {
        let mut store = CoordinationStore::new();
        store.set_config(
            LayoutConfig::new()
                .with_resource(Resource::new("a").with_title("Alpha").with_category("text"))
                .with_resource(Resource::new("b"))
                .with_resource(Resource::new("c"))
                .with_panel("p1", PanelConfig::new(["a", "b", "c"])),
        );

        let api = store.resource_api("b");
        let system = api.system();
        assert_eq!(system.get_my_panel().as_deref(), Some("p1"));
        assert_eq!(system.get_panel_neighbors(), vec!["a", "c"]);
        assert!(!system.is_visible());
        assert_eq!(system.get_my_info().unwrap().title, "b");
        assert_eq!(system.get_resource_info("a").unwrap().title, "Alpha");
        assert_eq!(system.get_all_panels(), vec!["p1"]);
        assert_eq!(system.get_resources_by_category()["text"].len(), 1);
    }
}
