//! Validated node lifecycle and uptime accounting
//!
//! TigerStyle: Explicit state machine with a closed transition table.
//!
//! The status manager is the strict layer on top of (or alongside) the
//! registry's coarse status: every change must be a legal edge of the
//! lifecycle, uptime is accounted per online session, and each node keeps
//! a bounded history of accepted transitions.

use crate::config::StatusConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::events::{EventBus, StatusEvent};
use crate::node::{NodeId, NodeStatus};
use roster_core::constants::TRANSITION_REASON_LENGTH_BYTES_MAX;
use roster_core::io::{TimeProvider, WallClockTime};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

/// An accepted status transition
///
/// Immutable once created; appended to the node's bounded history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    /// The node that transitioned
    pub node_id: NodeId,
    /// Status before the transition
    pub from: NodeStatus,
    /// Status after the transition
    pub to: NodeStatus,
    /// Caller-supplied reason (may be empty)
    pub reason: String,
    /// When the transition was accepted (Unix timestamp ms)
    pub at_ms: u64,
}

/// Per-node lifecycle state tracked by [`StatusManager`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatusEntry {
    /// The node's ID
    pub node_id: NodeId,
    /// Current status
    pub status: NodeStatus,
    /// First time the node ever went online (set once, never reset)
    pub first_online_at_ms: Option<u64>,
    /// When the current status was entered (Unix timestamp ms)
    pub status_changed_at_ms: u64,
    /// Accumulated time spent online, excluding the current session
    pub total_uptime_ms: u64,
    /// Start of the most recent online session
    pub last_online_at_ms: Option<u64>,
    /// Accepted transitions, newest last, bounded
    pub history: VecDeque<StatusTransition>,
}

impl NodeStatusEntry {
    fn new(node_id: NodeId, status: NodeStatus, now_ms: u64) -> Self {
        let online = status == NodeStatus::Online;

        Self {
            node_id,
            status,
            first_online_at_ms: online.then_some(now_ms),
            status_changed_at_ms: now_ms,
            total_uptime_ms: 0,
            last_online_at_ms: online.then_some(now_ms),
            history: VecDeque::new(),
        }
    }

    /// Total uptime including the current online session
    pub fn uptime_ms(&self, now_ms: u64) -> u64 {
        match (self.status, self.last_online_at_ms) {
            (NodeStatus::Online, Some(last_online)) => self
                .total_uptime_ms
                .saturating_add(now_ms.saturating_sub(last_online)),
            _ => self.total_uptime_ms,
        }
    }
}

/// Validated per-node status state machine
///
/// Owns the map `NodeId -> NodeStatusEntry`. The only mutating operations
/// are [`init_node`]/[`init_node_with_status`], [`transition`], and
/// [`remove_node`]; everything else is a read.
///
/// [`init_node`]: StatusManager::init_node
/// [`init_node_with_status`]: StatusManager::init_node_with_status
/// [`transition`]: StatusManager::transition
/// [`remove_node`]: StatusManager::remove_node
pub struct StatusManager {
    /// Entry map, exclusively owned by this instance
    entries: RwLock<HashMap<NodeId, NodeStatusEntry>>,
    /// Configuration
    config: StatusConfig,
    /// Per-instance event bus
    events: EventBus<StatusEvent>,
    /// Time provider
    time: Arc<dyn TimeProvider>,
}

impl StatusManager {
    /// Create a status manager with default configuration and the wall clock
    pub fn new() -> Self {
        Self::with_config(StatusConfig::default())
    }

    /// Create a status manager with custom configuration
    pub fn with_config(config: StatusConfig) -> Self {
        Self::with_providers(config, Arc::new(WallClockTime::new()))
    }

    /// Create a status manager with a custom time provider (for tests)
    pub fn with_providers(config: StatusConfig, time: Arc<dyn TimeProvider>) -> Self {
        debug_assert!(config.validate().is_ok());

        let events = EventBus::new(config.event_capacity);

        Self {
            entries: RwLock::new(HashMap::new()),
            config,
            events,
            time,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &StatusConfig {
        &self.config
    }

    /// Subscribe to status events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Lifecycle Operations
    // =========================================================================

    /// Start tracking a node in the online status
    pub async fn init_node(&self, node_id: NodeId) -> NodeStatusEntry {
        self.init_node_with_status(node_id, NodeStatus::Online).await
    }

    /// Start tracking a node in the given status
    ///
    /// Re-initializing a tracked node overwrites its entry: prior history
    /// and uptime are discarded and tracking starts fresh.
    pub async fn init_node_with_status(
        &self,
        node_id: NodeId,
        initial_status: NodeStatus,
    ) -> NodeStatusEntry {
        let now_ms = self.time.now_ms();
        let entry = NodeStatusEntry::new(node_id.clone(), initial_status, now_ms);

        {
            let mut entries = self.entries.write().await;
            entries.insert(node_id.clone(), entry.clone());
        }

        info!(node_id = %node_id, status = %initial_status, "node status tracking initialized");
        self.events
            .emit(StatusEvent::entered(initial_status, node_id, now_ms));

        entry
    }

    /// Apply a validated status transition
    ///
    /// Rejects unknown nodes (`NodeNotFound`) and edges outside the
    /// transition table (`InvalidTransition`) without mutating anything.
    /// On success returns the recorded transition.
    pub async fn transition(
        &self,
        node_id: &NodeId,
        new_status: NodeStatus,
        reason: impl Into<String>,
    ) -> RegistryResult<StatusTransition> {
        let mut reason = reason.into();
        if reason.len() > TRANSITION_REASON_LENGTH_BYTES_MAX {
            let mut end = TRANSITION_REASON_LENGTH_BYTES_MAX;
            while !reason.is_char_boundary(end) {
                end -= 1;
            }
            reason.truncate(end);
        }

        let transition = {
            let mut entries = self.entries.write().await;
            let entry = entries
                .get_mut(node_id)
                .ok_or_else(|| RegistryError::node_not_found(node_id.as_str()))?;

            if !entry.status.can_transition_to(new_status) {
                return Err(RegistryError::invalid_transition(
                    node_id.as_str(),
                    entry.status,
                    new_status,
                ));
            }

            let now_ms = self.time.now_ms();
            let from = entry.status;

            // Close the current online session before leaving it
            if from == NodeStatus::Online {
                if let Some(last_online) = entry.last_online_at_ms {
                    entry.total_uptime_ms = entry
                        .total_uptime_ms
                        .saturating_add(now_ms.saturating_sub(last_online));
                }
            }

            entry.status = new_status;
            entry.status_changed_at_ms = now_ms;

            if new_status == NodeStatus::Online {
                entry.last_online_at_ms = Some(now_ms);
                if entry.first_online_at_ms.is_none() {
                    entry.first_online_at_ms = Some(now_ms);
                }
            }

            let transition = StatusTransition {
                node_id: node_id.clone(),
                from,
                to: new_status,
                reason,
                at_ms: now_ms,
            };

            entry.history.push_back(transition.clone());
            while entry.history.len() > self.config.max_history_length {
                entry.history.pop_front();
            }

            transition
        };

        debug!(
            node_id = %node_id,
            from = %transition.from,
            to = %transition.to,
            "status transition accepted"
        );
        self.events.emit(StatusEvent::Changed(transition.clone()));
        self.events.emit(StatusEvent::entered(
            new_status,
            node_id.clone(),
            transition.at_ms,
        ));

        Ok(transition)
    }

    /// Stop tracking a node
    ///
    /// Returns whether the node was tracked.
    pub async fn remove_node(&self, node_id: &NodeId) -> bool {
        let removed = {
            let mut entries = self.entries.write().await;
            entries.remove(node_id).is_some()
        };

        if removed {
            info!(node_id = %node_id, "node status tracking removed");
        }

        removed
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current status of a node, if tracked
    pub async fn get_status(&self, node_id: &NodeId) -> Option<NodeStatus> {
        let entries = self.entries.read().await;
        entries.get(node_id).map(|e| e.status)
    }

    /// Snapshot of a node's full entry, if tracked
    pub async fn get_entry(&self, node_id: &NodeId) -> Option<NodeStatusEntry> {
        let entries = self.entries.read().await;
        entries.get(node_id).cloned()
    }

    /// Total uptime including the current online session
    ///
    /// Untracked nodes report 0.
    pub async fn get_uptime(&self, node_id: &NodeId) -> u64 {
        let now_ms = self.time.now_ms();
        let entries = self.entries.read().await;
        entries.get(node_id).map_or(0, |e| e.uptime_ms(now_ms))
    }

    /// Most recent transitions in chronological order
    ///
    /// With `limit`, returns at most that many of the newest entries;
    /// without it, the entire bounded history.
    pub async fn get_history(
        &self,
        node_id: &NodeId,
        limit: Option<usize>,
    ) -> Vec<StatusTransition> {
        let entries = self.entries.read().await;
        match entries.get(node_id) {
            Some(entry) => {
                let skip = limit.map_or(0, |l| entry.history.len().saturating_sub(l));
                entry.history.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// IDs of all tracked nodes currently in the given status
    pub async fn get_nodes_by_status(&self, status: NodeStatus) -> Vec<NodeId> {
        let entries = self.entries.read().await;
        entries
            .values()
            .filter(|e| e.status == status)
            .map(|e| e.node_id.clone())
            .collect()
    }

    /// IDs of all tracked nodes
    pub async fn tracked_nodes(&self) -> Vec<NodeId> {
        let entries = self.entries.read().await;
        entries.keys().cloned().collect()
    }

    /// Number of tracked nodes
    pub async fn tracked_count(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }
}

impl Default for StatusManager {
    fn default() -> Self {
        Self::new()
    }
}
