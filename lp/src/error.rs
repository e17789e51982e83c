//! Error types for coordination operations

use thiserror::Error;

/// Usage errors from store and facade operations
///
/// None of these are fatal: the operation simply did not happen and the
/// store is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinationError {
    #[error("Panel not found: {0}")]
    PanelNotFound(String),

    #[error("Panel {0} has no resources")]
    EmptyPanel(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource {resource_id} exists but is not in panel {panel_id}")]
    ResourceNotInPanel { resource_id: String, panel_id: String },

    #[error("Unknown sender resource: {0}")]
    UnknownSender(String),

    #[error("Unknown target resource: {0}")]
    UnknownTarget(String),

    #[error("Message of type '{message_type}' rejected by its handler")]
    Rejected { message_type: String },

    #[error("Invalid message content: {0}")]
    InvalidContent(String),
}

impl CoordinationError {
    /// Check if this error names a panel or resource that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoordinationError::PanelNotFound(_)
                | CoordinationError::ResourceNotFound(_)
                | CoordinationError::UnknownSender(_)
                | CoordinationError::UnknownTarget(_)
        )
    }
}

/// Result alias for coordination operations
pub type CoordinationResult<T> = Result<T, CoordinationError>;
