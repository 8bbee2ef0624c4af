//! Component event types and broadcast bus
//!
//! Each registry and status manager instance owns its own bus; there is no
//! process-wide emitter. Subscribers receive events on a tokio broadcast
//! channel, so a slow consumer lags and drops instead of blocking the
//! mutation that triggered the event.

use crate::node::{NodeId, NodeStatus, RegisteredNode};
use crate::status::StatusTransition;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Membership events emitted by [`crate::NodeRegistry`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegistryEvent {
    /// A node joined the cluster for the first time
    Registered { node: RegisteredNode },
    /// A known node re-registered, heartbeat, or had its status overridden
    Updated { node: RegisteredNode },
    /// A node was removed from the registry
    Deregistered { node_id: NodeId },
    /// The stale sweep marked a silent node offline
    Stale { node_id: NodeId },
}

impl RegistryEvent {
    /// The node this event concerns
    pub fn node_id(&self) -> &NodeId {
        match self {
            Self::Registered { node } | Self::Updated { node } => &node.id,
            Self::Deregistered { node_id } | Self::Stale { node_id } => node_id,
        }
    }
}

/// Lifecycle events emitted by [`crate::StatusManager`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StatusEvent {
    /// A validated transition was accepted
    Changed(StatusTransition),
    /// Node entered the online status
    Online { node_id: NodeId, at_ms: u64 },
    /// Node entered the offline status
    Offline { node_id: NodeId, at_ms: u64 },
    /// Node entered the draining status
    Draining { node_id: NodeId, at_ms: u64 },
    /// Node entered the maintenance status
    Maintenance { node_id: NodeId, at_ms: u64 },
}

impl StatusEvent {
    /// Build the per-status event for a node entering `status`
    pub fn entered(status: NodeStatus, node_id: NodeId, at_ms: u64) -> Self {
        match status {
            NodeStatus::Online => Self::Online { node_id, at_ms },
            NodeStatus::Offline => Self::Offline { node_id, at_ms },
            NodeStatus::Draining => Self::Draining { node_id, at_ms },
            NodeStatus::Maintenance => Self::Maintenance { node_id, at_ms },
        }
    }

    /// The node this event concerns
    pub fn node_id(&self) -> &NodeId {
        match self {
            Self::Changed(transition) => &transition.node_id,
            Self::Online { node_id, .. }
            | Self::Offline { node_id, .. }
            | Self::Draining { node_id, .. }
            | Self::Maintenance { node_id, .. } => node_id,
        }
    }
}

/// Per-instance broadcast bus
///
/// Thin wrapper over `tokio::sync::broadcast` that tolerates having no
/// subscribers: emission is fire-and-forget.
#[derive(Debug, Clone)]
pub struct EventBus<E> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone> EventBus<E> {
    /// Create a bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    /// Emit an event to all current subscribers
    ///
    /// A send with no subscribers is a no-op, not an error.
    pub fn emit(&self, event: E) {
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
