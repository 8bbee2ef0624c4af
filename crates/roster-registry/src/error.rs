//! Registry error types
//!
//! TigerStyle: Explicit error variants with context.
//!
//! Most registry operations signal "unknown node" through their return
//! value (`false`/`None`) rather than an error. The error type exists for
//! the guarded operations: node ID validation and status transitions,
//! where "unknown node" and "illegal transition" are semantically
//! different failures and callers need to tell them apart.

use crate::node::NodeStatus;
use thiserror::Error;

/// Registry-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Node not found in registry
    #[error("node not found: {node_id}")]
    NodeNotFound { node_id: String },

    /// Invalid node ID
    #[error("invalid node ID: {id}, reason: {reason}")]
    InvalidNodeId { id: String, reason: String },

    /// Requested status change is not a legal edge in the lifecycle
    #[error("invalid transition for node {node_id}: {from} -> {to}")]
    InvalidTransition {
        node_id: String,
        from: NodeStatus,
        to: NodeStatus,
    },
}

impl RegistryError {
    /// Create a node not found error
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            node_id: node_id.into(),
        }
    }

    /// Create an invalid transition error
    pub fn invalid_transition(
        node_id: impl Into<String>,
        from: NodeStatus,
        to: NodeStatus,
    ) -> Self {
        Self::InvalidTransition {
            node_id: node_id.into(),
            from,
            to,
        }
    }
}

/// Result type for registry operations
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::node_not_found("node-1");
        assert!(err.to_string().contains("node-1"));
    }

    #[test]
    fn test_invalid_transition_display() {
        let err =
            RegistryError::invalid_transition("node-1", NodeStatus::Draining, NodeStatus::Maintenance);
        let text = err.to_string();
        assert!(text.contains("draining"));
        assert!(text.contains("maintenance"));
    }
}
