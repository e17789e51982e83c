//! Layout configuration: resources, panels and optional initial state

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::messaging::Message;

/// An addressable unit of content, unaware of which panels show it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,

    /// Renderable content, opaque to the coordination layer
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub content: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Resource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: Value::Null,
            title: None,
            description: None,
            icon: None,
            category: None,
            metadata: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }
}

/// A named, ordered sequence of resource ids
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelConfig {
    pub resource_ids: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_resource_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_index: Option<i64>,
}

impl PanelConfig {
    pub fn new<I, S>(resource_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resource_ids: resource_ids.into_iter().map(Into::into).collect(),
            initial_resource_id: None,
            initial_index: None,
        }
    }

    pub fn with_initial_index(mut self, index: i64) -> Self {
        self.initial_index = Some(index);
        self
    }

    pub fn with_initial_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.initial_resource_id = Some(resource_id.into());
        self
    }

    /// Position of a resource in this panel
    pub fn position_of(&self, resource_id: &str) -> Option<usize> {
        self.resource_ids.iter().position(|id| id == resource_id)
    }

    /// Clamp any index into `[0, max(0, len - 1)]`
    pub fn clamp_index(&self, index: i64) -> usize {
        let last = self.resource_ids.len().saturating_sub(1);
        index.clamp(0, last as i64) as usize
    }

    /// Starting index from panel-level settings: explicit index, then initial resource, then 0
    pub fn initial_position(&self) -> usize {
        if let Some(index) = self.initial_index {
            return self.clamp_index(index);
        }
        self.initial_resource_id
            .as_deref()
            .and_then(|id| self.position_of(id))
            .unwrap_or(0)
    }
}

/// Navigation position of one panel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelNavigation {
    pub current_index: usize,
}

/// Explicit starting state supplied alongside a layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialState {
    /// Overrides both persisted and panel-level navigation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel_navigation: Option<BTreeMap<String, PanelNavigation>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_messages: Option<HashMap<String, Vec<Message>>>,
}

/// Full layout consumed by `CoordinationStore::set_config`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    #[serde(default)]
    pub resources: Vec<Resource>,

    #[serde(default)]
    pub panels: BTreeMap<String, PanelConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<InitialState>,
}

/// Structural problem found in a layout
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigIssue {
    #[error("Resource id '{0}' is defined more than once")]
    DuplicateResource(String),

    #[error("Panel '{panel_id}' references unknown resource '{resource_id}'")]
    UnknownResource { panel_id: String, resource_id: String },

    #[error("Panel '{panel_id}' has initialResourceId '{resource_id}' which is not in the panel")]
    InitialResourceNotInPanel { panel_id: String, resource_id: String },

    #[error("Panel '{panel_id}' has initialIndex {index} outside 0..{len}")]
    InitialIndexOutOfRange { panel_id: String, index: i64, len: usize },

    #[error("Panel '{0}' has no resources")]
    EmptyPanel(String),
}

impl LayoutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_panel(mut self, panel_id: impl Into<String>, panel: PanelConfig) -> Self {
        self.panels.insert(panel_id.into(), panel);
        self
    }

    pub fn with_initial_state(mut self, initial_state: InitialState) -> Self {
        self.initial_state = Some(initial_state);
        self
    }

    /// Load a layout file; `.json` is parsed as JSON, anything else as YAML
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "LayoutConfig::load: called");
        let content = fs::read_to_string(path).context(format!("Failed to read layout file {}", path.display()))?;

        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let config = if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
        .context(format!("Failed to parse layout file {}", path.display()))?;

        info!(
            path = %path.display(),
            resources = config.resources.len(),
            panels = config.panels.len(),
            "Loaded layout"
        );
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Invalid YAML layout")
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Invalid JSON layout")
    }

    /// Check the layout for structural problems
    ///
    /// Issues are advisory: the store still applies a layout that has them.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        debug!("LayoutConfig::validate: called");
        let mut issues = Vec::new();
        let mut seen = HashSet::new();

        for resource in &self.resources {
            if !seen.insert(resource.id.as_str()) {
                issues.push(ConfigIssue::DuplicateResource(resource.id.clone()));
            }
        }

        for (panel_id, panel) in &self.panels {
            if panel.resource_ids.is_empty() {
                issues.push(ConfigIssue::EmptyPanel(panel_id.clone()));
            }

            for resource_id in &panel.resource_ids {
                if !seen.contains(resource_id.as_str()) {
                    issues.push(ConfigIssue::UnknownResource {
                        panel_id: panel_id.clone(),
                        resource_id: resource_id.clone(),
                    });
                }
            }

            if let Some(resource_id) = &panel.initial_resource_id
                && panel.position_of(resource_id).is_none()
            {
                issues.push(ConfigIssue::InitialResourceNotInPanel {
                    panel_id: panel_id.clone(),
                    resource_id: resource_id.clone(),
                });
            }

            if let Some(index) = panel.initial_index
                && (index < 0 || index as usize >= panel.resource_ids.len())
            {
                issues.push(ConfigIssue::InitialIndexOutOfRange {
                    panel_id: panel_id.clone(),
                    index,
                    len: panel.resource_ids.len(),
                });
            }
        }

        issues
    }

    /// Look up a resource definition by id
    pub fn resource(&self, resource_id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == resource_id)
    }
}
