//! Message content and message envelope types
//!
//! Content is a sum type keyed by lifecycle, so a state message without a
//! state key cannot be constructed. The wire form is the flat JSON object that
//! feature plugins produce: `{ "type", "lifecycle"?, "stateKey"?, "ttl"?, ...fields }`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Retention and consumption policy of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// Retained until superseded by a newer state with the same key
    State,
    /// One-shot, optionally expiring after a TTL
    #[default]
    Event,
    /// One-shot, retained until consumed
    Command,
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::State => write!(f, "state"),
            Self::Event => write!(f, "event"),
            Self::Command => write!(f, "command"),
        }
    }
}

/// Errors converting loosely-typed JSON into [`MessageContent`]
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("State message of type '{message_type}' is missing stateKey")]
    MissingStateKey { message_type: String },

    #[error("Message content is not valid: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Payload of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawContent", into = "RawContent")]
pub enum MessageContent {
    State {
        message_type: String,
        state_key: String,
        data: Map<String, Value>,
    },
    Event {
        message_type: String,
        ttl_ms: Option<u64>,
        data: Map<String, Value>,
    },
    Command {
        message_type: String,
        data: Map<String, Value>,
    },
}

/// Flat wire representation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContent {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lifecycle: Option<Lifecycle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ttl: Option<u64>,
    #[serde(flatten)]
    data: Map<String, Value>,
}

impl TryFrom<RawContent> for MessageContent {
    type Error = ContentError;

    fn try_from(raw: RawContent) -> Result<Self, Self::Error> {
        match raw.lifecycle.unwrap_or_default() {
            Lifecycle::State => {
                let state_key = raw.state_key.ok_or_else(|| ContentError::MissingStateKey {
                    message_type: raw.message_type.clone(),
                })?;
                Ok(Self::State {
                    message_type: raw.message_type,
                    state_key,
                    data: raw.data,
                })
            }
            Lifecycle::Event => Ok(Self::Event {
                message_type: raw.message_type,
                ttl_ms: raw.ttl,
                data: raw.data,
            }),
            Lifecycle::Command => Ok(Self::Command {
                message_type: raw.message_type,
                data: raw.data,
            }),
        }
    }
}

impl From<MessageContent> for RawContent {
    fn from(content: MessageContent) -> Self {
        let lifecycle = Some(content.lifecycle());
        match content {
            MessageContent::State {
                message_type,
                state_key,
                data,
            } => Self {
                message_type,
                lifecycle,
                state_key: Some(state_key),
                ttl: None,
                data,
            },
            MessageContent::Event {
                message_type,
                ttl_ms,
                data,
            } => Self {
                message_type,
                lifecycle,
                state_key: None,
                ttl: ttl_ms,
                data,
            },
            MessageContent::Command { message_type, data } => Self {
                message_type,
                lifecycle,
                state_key: None,
                ttl: None,
                data,
            },
        }
    }
}

impl MessageContent {
    /// State content retained per `(target, state_key)`
    pub fn state(message_type: impl Into<String>, state_key: impl Into<String>) -> Self {
        Self::State {
            message_type: message_type.into(),
            state_key: state_key.into(),
            data: Map::new(),
        }
    }

    /// Event content without expiry
    pub fn event(message_type: impl Into<String>) -> Self {
        Self::Event {
            message_type: message_type.into(),
            ttl_ms: None,
            data: Map::new(),
        }
    }

    pub fn command(message_type: impl Into<String>) -> Self {
        Self::Command {
            message_type: message_type.into(),
            data: Map::new(),
        }
    }

    /// Parse plugin-produced JSON; a missing lifecycle means event
    pub fn from_value(value: Value) -> Result<Self, ContentError> {
        debug!("MessageContent::from_value: called");
        let raw: RawContent = serde_json::from_value(value)?;
        Self::try_from(raw)
    }

    /// Flat JSON form of this content
    pub fn to_value(&self) -> Value {
        serde_json::to_value(RawContent::from(self.clone())).unwrap_or(Value::Null)
    }

    /// Attach a domain field
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data_mut().insert(key.into(), value.into());
        self
    }

    /// Set the TTL of an event; ignored for other lifecycles
    pub fn with_ttl(mut self, ttl: u64) -> Self {
        if let Self::Event { ttl_ms, .. } = &mut self {
            *ttl_ms = Some(ttl);
        }
        self
    }

    pub fn message_type(&self) -> &str {
        match self {
            Self::State { message_type, .. }
            | Self::Event { message_type, .. }
            | Self::Command { message_type, .. } => message_type,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match self {
            Self::State { .. } => Lifecycle::State,
            Self::Event { .. } => Lifecycle::Event,
            Self::Command { .. } => Lifecycle::Command,
        }
    }

    pub fn state_key(&self) -> Option<&str> {
        match self {
            Self::State { state_key, .. } => Some(state_key),
            _ => None,
        }
    }

    pub fn ttl_ms(&self) -> Option<u64> {
        match self {
            Self::Event { ttl_ms, .. } => *ttl_ms,
            _ => None,
        }
    }

    /// Domain fields carried alongside the envelope fields
    pub fn data(&self) -> &Map<String, Value> {
        match self {
            Self::State { data, .. } | Self::Event { data, .. } | Self::Command { data, .. } => data,
        }
    }

    fn data_mut(&mut self) -> &mut Map<String, Value> {
        match self {
            Self::State { data, .. } | Self::Event { data, .. } | Self::Command { data, .. } => data,
        }
    }

    /// Look up a single domain field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data().get(key)
    }
}

/// A message addressed to one resource, or broadcast when `to_resource_id` is absent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    /// Unix milliseconds, non-decreasing across sends
    pub timestamp: i64,
    pub from_resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_resource_id: Option<String>,
    pub content: MessageContent,
}

impl Message {
    pub fn lifecycle(&self) -> Lifecycle {
        self.content.lifecycle()
    }

    pub fn is_broadcast(&self) -> bool {
        self.to_resource_id.is_none()
    }

    /// True once an event's TTL has elapsed since it was sent
    pub fn is_expired(&self, now_ms: i64) -> bool {
        match self.content.ttl_ms() {
            Some(ttl) => u64::try_from(now_ms.saturating_sub(self.timestamp)).is_ok_and(|age| age > ttl),
            None => false,
        }
    }

    /// True if this is a state message for `state_key`
    pub fn holds_state(&self, state_key: &str) -> bool {
        self.content.state_key() == Some(state_key)
    }
}
