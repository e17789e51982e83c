//! Read-only resource descriptions

use serde::Serialize;
use serde_json::Value;

use crate::config::Resource;

/// Category used for resources that declare none
pub const UNCATEGORIZED: &str = "uncategorized";

/// Descriptive view of a resource, without its renderable content
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub id: String,
    /// Falls back to the id when the resource has no title
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ResourceInfo {
    pub fn category_or_default(&self) -> &str {
        self.category.as_deref().unwrap_or(UNCATEGORIZED)
    }
}

impl From<&Resource> for ResourceInfo {
    fn from(resource: &Resource) -> Self {
        Self {
            id: resource.id.clone(),
            title: resource.title.clone().unwrap_or_else(|| resource.id.clone()),
            description: resource.description.clone(),
            icon: resource.icon.clone(),
            category: resource.category.clone(),
            metadata: resource.metadata.clone(),
        }
    }
}
