//! ResourceApi - per-resource view over the coordination store
//!
//! A resource never talks to the store directly. It gets a [`ResourceApi`]
//! scoped to its own id and uses one of three narrow interfaces:
//! [`NavigationApi`], [`MessagingApi`] and [`SystemApi`].

mod messaging;
mod navigation;
mod system;

pub use messaging::MessagingApi;
pub use navigation::NavigationApi;
pub use system::SystemApi;

use tracing::debug;

use crate::store::CoordinationStore;

/// Store access scoped to a single resource
pub struct ResourceApi<'a> {
    store: &'a mut CoordinationStore,
    resource_id: String,
}

impl<'a> ResourceApi<'a> {
    pub fn new(store: &'a mut CoordinationStore, resource_id: impl Into<String>) -> Self {
        let resource_id = resource_id.into();
        debug!(%resource_id, "ResourceApi::new: called");
        Self { store, resource_id }
    }

    /// The resource this view belongs to
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn navigation(&mut self) -> NavigationApi<'_> {
        NavigationApi::new(self.store, &self.resource_id)
    }

    pub fn messaging(&mut self) -> MessagingApi<'_> {
        MessagingApi::new(self.store, &self.resource_id)
    }

    pub fn system(&self) -> SystemApi<'_> {
        SystemApi::new(&*self.store, &self.resource_id)
    }
}

impl CoordinationStore {
    /// Scoped view for one resource
    pub fn resource_api(&mut self, resource_id: impl Into<String>) -> ResourceApi<'_> {
        ResourceApi::new(self, resource_id)
    }
}
