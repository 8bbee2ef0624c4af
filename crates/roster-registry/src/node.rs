//! Node types and identification
//!
//! TigerStyle: Explicit node lifecycle with validated identifiers.

use crate::error::{RegistryError, RegistryResult};
use roster_core::constants::NODE_ID_LENGTH_BYTES_MAX;
use roster_core::io::{RngProvider, StdRngProvider};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Unique identifier for a cluster node
///
/// Node IDs should be stable across restarts for the same physical node,
/// typically derived from hostname or configured explicitly.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Create a new NodeId with validation
    ///
    /// # Arguments
    /// * `id` - The node identifier (alphanumeric, dashes, underscores, dots)
    ///
    /// # Errors
    /// Returns error if id is empty, too long, or contains invalid characters.
    pub fn new(id: impl Into<String>) -> RegistryResult<Self> {
        let id = id.into();

        // TigerStyle: Explicit validation
        if id.is_empty() {
            return Err(RegistryError::InvalidNodeId {
                id: id.clone(),
                reason: "node ID cannot be empty".into(),
            });
        }

        if id.len() > NODE_ID_LENGTH_BYTES_MAX {
            return Err(RegistryError::InvalidNodeId {
                id: id.clone(),
                reason: format!(
                    "node ID length {} exceeds limit {}",
                    id.len(),
                    NODE_ID_LENGTH_BYTES_MAX
                ),
            });
        }

        // Validate characters (alphanumeric, dash, underscore, dot)
        let valid = id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.');

        if !valid {
            return Err(RegistryError::InvalidNodeId {
                id: id.clone(),
                reason: "node ID contains invalid characters".into(),
            });
        }

        Ok(Self(id))
    }

    /// Create a NodeId without validation (for internal use)
    ///
    /// # Safety
    /// Caller must ensure the ID is valid.
    #[doc(hidden)]
    pub fn new_unchecked(id: String) -> Self {
        debug_assert!(!id.is_empty());
        debug_assert!(id.len() <= NODE_ID_LENGTH_BYTES_MAX);
        Self(id)
    }

    /// Get the node ID as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generate a unique node ID based on hostname and random suffix
    pub fn generate() -> Self {
        Self::generate_with_rng(&StdRngProvider::new())
    }

    /// Generate a unique node ID with injected RNG (for tests)
    pub fn generate_with_rng(rng: &dyn RngProvider) -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let suffix: u32 = rng.next_u64() as u32;
        let id = format!("{}-{:08x}", hostname, suffix);

        // Truncate if too long
        let truncated = if id.len() > NODE_ID_LENGTH_BYTES_MAX {
            id[..NODE_ID_LENGTH_BYTES_MAX].to_string()
        } else {
            id
        };

        Self::new_unchecked(truncated)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Operational status of a cluster node
///
/// Status transitions:
/// ```text
///               ┌──────────> Draining ──────────┐
///               │                │              │
/// Online <──────┴──> Offline <───┘              │
///    │                  │                       │
///    └──> Maintenance <─┘      (Draining ──> Online/Offline)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Node is alive and accepting work
    Online,
    /// Node is unreachable or has missed its heartbeat window
    Offline,
    /// Node is finishing in-flight work but accepts nothing new
    Draining,
    /// Node is under planned unavailability
    Maintenance,
}

impl NodeStatus {
    /// Check if the node can accept new work
    pub fn can_accept_work(&self) -> bool {
        matches!(self, Self::Online)
    }

    /// Check if the transition from current status to new status is valid
    ///
    /// Valid edges:
    /// - Online -> Offline | Draining | Maintenance
    /// - Offline -> Online | Maintenance
    /// - Draining -> Offline | Online
    /// - Maintenance -> Online | Offline
    pub fn can_transition_to(&self, new_status: NodeStatus) -> bool {
        matches!(
            (self, new_status),
            (NodeStatus::Online, NodeStatus::Offline)
                | (NodeStatus::Online, NodeStatus::Draining)
                | (NodeStatus::Online, NodeStatus::Maintenance)
                | (NodeStatus::Offline, NodeStatus::Online)
                | (NodeStatus::Offline, NodeStatus::Maintenance)
                | (NodeStatus::Draining, NodeStatus::Offline)
                | (NodeStatus::Draining, NodeStatus::Online)
                | (NodeStatus::Maintenance, NodeStatus::Online)
                | (NodeStatus::Maintenance, NodeStatus::Offline)
        )
    }

    /// All statuses (for exhaustive checks in tests and dashboards)
    pub const ALL: [NodeStatus; 4] = [
        NodeStatus::Online,
        NodeStatus::Offline,
        NodeStatus::Draining,
        NodeStatus::Maintenance,
    ];
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
            Self::Draining => write!(f, "draining"),
            Self::Maintenance => write!(f, "maintenance"),
        }
    }
}

/// Caller-supplied registration payload
///
/// What a worker announces about itself when joining the cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRegistration {
    /// Unique node identifier
    pub id: NodeId,
    /// Human-readable node name
    pub name: String,
    /// Node's base URL for control-plane calls
    pub url: String,
    /// Capabilities this node advertises (e.g., "git", "ci")
    pub capabilities: HashSet<String>,
    /// Deployment region
    pub region: String,
    /// Custom metadata
    pub metadata: HashMap<String, serde_json::Value>,
}

impl NodeRegistration {
    /// Create a new registration with empty capabilities and metadata
    pub fn new(id: NodeId, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            url: url.into(),
            capabilities: HashSet::new(),
            region: String::new(),
            metadata: HashMap::new(),
        }
    }

    /// Set the deployment region
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Add an advertised capability
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A node as tracked by the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredNode {
    /// Unique node identifier
    pub id: NodeId,
    /// Human-readable node name
    pub name: String,
    /// Node's base URL for control-plane calls
    pub url: String,
    /// Capabilities this node advertises
    pub capabilities: HashSet<String>,
    /// Deployment region
    pub region: String,
    /// When the node first registered (Unix timestamp ms, immutable)
    pub registered_at_ms: u64,
    /// Time of last heartbeat or registration (Unix timestamp ms)
    pub last_seen_at_ms: u64,
    /// Current coarse status
    pub status: NodeStatus,
    /// Custom metadata
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RegisteredNode {
    /// Create a registry entry from a registration at the given timestamp
    pub fn from_registration(registration: NodeRegistration, now_ms: u64) -> Self {
        Self {
            id: registration.id,
            name: registration.name,
            url: registration.url,
            capabilities: registration.capabilities,
            region: registration.region,
            registered_at_ms: now_ms,
            last_seen_at_ms: now_ms,
            status: NodeStatus::Online,
            metadata: registration.metadata,
        }
    }

    /// Refresh the last-seen timestamp
    pub fn touch(&mut self, now_ms: u64) {
        // Accept timestamps from a skewed clock, but never move backwards
        if now_ms >= self.last_seen_at_ms {
            self.last_seen_at_ms = now_ms;
        }
    }

    /// Check if the node has been silent past the stale threshold
    pub fn is_stale(&self, now_ms: u64, threshold_ms: u64) -> bool {
        debug_assert!(threshold_ms > 0);
        now_ms.saturating_sub(self.last_seen_at_ms) > threshold_ms
    }
}
