//! Node membership registry
//!
//! TigerStyle: Single owner of membership truth — who is in the cluster
//! and when was each node last seen.
//!
//! The registry never fails an operation: unknown-node calls return
//! `false`/`None`/empty instead of an error, and `register` always
//! succeeds as an upsert. The only autonomous state change is the stale
//! sweep, which runs on an explicitly started, explicitly stopped task.

use crate::config::RegistryConfig;
use crate::events::{EventBus, RegistryEvent};
use crate::node::{NodeId, NodeRegistration, NodeStatus, RegisteredNode};
use roster_core::io::{TimeProvider, WallClockTime};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// In-memory node membership registry
///
/// Tracks registered nodes, their connection metadata, last-seen
/// timestamps, and coarse status. Nodes that stay silent past the
/// configured threshold are flipped offline by [`cleanup_stale_nodes`]
/// (either called directly or via the periodic sweep task).
///
/// All state is process-memory only; restart loses all membership.
///
/// [`cleanup_stale_nodes`]: NodeRegistry::cleanup_stale_nodes
pub struct NodeRegistry {
    /// Node map, exclusively owned by this instance
    nodes: Arc<RwLock<HashMap<NodeId, RegisteredNode>>>,
    /// Configuration
    config: RegistryConfig,
    /// Per-instance event bus
    events: EventBus<RegistryEvent>,
    /// Time provider
    time: Arc<dyn TimeProvider>,
    /// Handle of the running sweep task, if any
    cleanup_task: RwLock<Option<JoinHandle<()>>>,
    /// Shutdown signal for the sweep task
    shutdown: Arc<Notify>,
    /// Whether shutdown was requested
    shutdown_requested: Arc<AtomicBool>,
}

impl NodeRegistry {
    /// Create a registry with default configuration and the wall clock
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self::with_providers(config, Arc::new(WallClockTime::new()))
    }

    /// Create a registry with a custom time provider (for tests)
    pub fn with_providers(config: RegistryConfig, time: Arc<dyn TimeProvider>) -> Self {
        debug_assert!(config.validate().is_ok());

        let events = EventBus::new(config.event_capacity);

        Self {
            nodes: Arc::new(RwLock::new(HashMap::new())),
            config,
            events,
            time,
            cleanup_task: RwLock::new(None),
            shutdown: Arc::new(Notify::new()),
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Subscribe to membership events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Membership Operations
    // =========================================================================

    /// Register a node, or refresh it if already known
    ///
    /// Re-registration preserves `registered_at_ms`, replaces the caller
    /// supplied fields, and resets `last_seen_at_ms` and status to online.
    /// Returns a snapshot of the stored node. Never fails.
    pub async fn register(&self, registration: NodeRegistration) -> RegisteredNode {
        let now_ms = self.time.now_ms();

        let (node, previously_known) = {
            let mut nodes = self.nodes.write().await;
            match nodes.get_mut(&registration.id) {
                Some(existing) => {
                    existing.name = registration.name;
                    existing.url = registration.url;
                    existing.capabilities = registration.capabilities;
                    existing.region = registration.region;
                    existing.metadata = registration.metadata;
                    existing.touch(now_ms);
                    existing.status = NodeStatus::Online;
                    (existing.clone(), true)
                }
                None => {
                    let node = RegisteredNode::from_registration(registration, now_ms);
                    nodes.insert(node.id.clone(), node.clone());
                    (node, false)
                }
            }
        };

        if previously_known {
            debug!(node_id = %node.id, "node re-registered");
            self.events.emit(RegistryEvent::Updated { node: node.clone() });
        } else {
            info!(node_id = %node.id, region = %node.region, "node registered");
            self.events
                .emit(RegistryEvent::Registered { node: node.clone() });
        }

        node
    }

    /// Remove a node from the registry
    ///
    /// Returns whether the node existed.
    pub async fn deregister(&self, node_id: &NodeId) -> bool {
        let removed = {
            let mut nodes = self.nodes.write().await;
            nodes.remove(node_id).is_some()
        };

        if removed {
            info!(node_id = %node_id, "node deregistered");
            self.events.emit(RegistryEvent::Deregistered {
                node_id: node_id.clone(),
            });
        }

        removed
    }

    /// Record a liveness signal from a node
    ///
    /// Refreshes `last_seen_at_ms`; an offline node flips back online.
    /// Draining and maintenance statuses are left alone. Returns `false`
    /// if the node is unknown.
    pub async fn heartbeat(&self, node_id: &NodeId) -> bool {
        let now_ms = self.time.now_ms();

        let node = {
            let mut nodes = self.nodes.write().await;
            nodes.get_mut(node_id).map(|node| {
                node.touch(now_ms);
                if node.status == NodeStatus::Offline {
                    node.status = NodeStatus::Online;
                }
                node.clone()
            })
        };

        match node {
            Some(node) => {
                self.events.emit(RegistryEvent::Updated { node });
                true
            }
            None => false,
        }
    }

    /// Override a node's status directly (e.g., administrative drain)
    ///
    /// No transition-table check; the registry tracks coarse status only.
    /// Returns `false` if the node is unknown.
    pub async fn set_node_status(&self, node_id: &NodeId, status: NodeStatus) -> bool {
        let node = {
            let mut nodes = self.nodes.write().await;
            nodes.get_mut(node_id).map(|node| {
                node.status = status;
                node.clone()
            })
        };

        match node {
            Some(node) => {
                info!(node_id = %node_id, status = %status, "node status overridden");
                self.events.emit(RegistryEvent::Updated { node });
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Get a snapshot of a node
    pub async fn get_node(&self, node_id: &NodeId) -> Option<RegisteredNode> {
        let nodes = self.nodes.read().await;
        nodes.get(node_id).cloned()
    }

    /// List all registered nodes
    pub async fn list_nodes(&self) -> Vec<RegisteredNode> {
        let nodes = self.nodes.read().await;
        nodes.values().cloned().collect()
    }

    /// List nodes with a specific status
    pub async fn list_nodes_by_status(&self, status: NodeStatus) -> Vec<RegisteredNode> {
        let nodes = self.nodes.read().await;
        nodes
            .values()
            .filter(|n| n.status == status)
            .cloned()
            .collect()
    }

    /// List nodes in a specific region (exact match)
    pub async fn list_nodes_by_region(&self, region: &str) -> Vec<RegisteredNode> {
        let nodes = self.nodes.read().await;
        nodes
            .values()
            .filter(|n| n.region == region)
            .cloned()
            .collect()
    }

    /// Number of registered nodes
    pub async fn node_count(&self) -> usize {
        let nodes = self.nodes.read().await;
        nodes.len()
    }

    // =========================================================================
    // Stale Detection
    // =========================================================================

    /// Flip silent online nodes offline
    ///
    /// Every online node whose last-seen timestamp is older than the
    /// stale threshold goes offline and emits one `Stale` event. Nodes
    /// already offline are never re-emitted. Returns the affected IDs.
    pub async fn cleanup_stale_nodes(&self) -> Vec<NodeId> {
        let now_ms = self.time.now_ms();
        Self::sweep_once(
            &self.nodes,
            &self.events,
            now_ms,
            self.config.stale_threshold_ms,
        )
        .await
    }

    async fn sweep_once(
        nodes: &RwLock<HashMap<NodeId, RegisteredNode>>,
        events: &EventBus<RegistryEvent>,
        now_ms: u64,
        stale_threshold_ms: u64,
    ) -> Vec<NodeId> {
        let stale = {
            let mut nodes = nodes.write().await;
            let mut stale = Vec::new();
            for (node_id, node) in nodes.iter_mut() {
                if node.status == NodeStatus::Online && node.is_stale(now_ms, stale_threshold_ms) {
                    node.status = NodeStatus::Offline;
                    stale.push(node_id.clone());
                }
            }
            stale
        };

        for node_id in &stale {
            warn!(node_id = %node_id, "node went stale, marked offline");
            events.emit(RegistryEvent::Stale {
                node_id: node_id.clone(),
            });
        }

        stale
    }

    /// Start the periodic stale sweep
    ///
    /// Runs `cleanup_stale_nodes` every `cleanup_interval_ms`. Returns
    /// `false` (no-op) if the sweep is already running.
    pub async fn start_cleanup(&self) -> bool {
        let mut task = self.cleanup_task.write().await;
        if task.is_some() {
            return false;
        }

        self.shutdown_requested.store(false, Ordering::SeqCst);

        let nodes = self.nodes.clone();
        let events = self.events.clone();
        let time = self.time.clone();
        let interval_ms = self.config.cleanup_interval_ms;
        let stale_threshold_ms = self.config.stale_threshold_ms;
        let shutdown = self.shutdown.clone();
        let shutdown_requested = self.shutdown_requested.clone();

        let handle = tokio::spawn(async move {
            debug!(interval_ms, "stale sweep task started");
            loop {
                tokio::select! {
                    _ = time.sleep_ms(interval_ms) => {
                        if shutdown_requested.load(Ordering::SeqCst) {
                            break;
                        }
                        let now_ms = time.now_ms();
                        let stale =
                            Self::sweep_once(&nodes, &events, now_ms, stale_threshold_ms).await;
                        if !stale.is_empty() {
                            debug!(count = stale.len(), "stale sweep flipped nodes offline");
                        }
                    }
                    _ = shutdown.notified() => {
                        debug!("stale sweep task shutting down");
                        break;
                    }
                }
            }
        });

        *task = Some(handle);
        true
    }

    /// Stop the periodic stale sweep
    ///
    /// Idempotent; safe to call repeatedly or before `start_cleanup`.
    /// Waits for the task to finish so shutdown is deterministic.
    pub async fn stop_cleanup(&self) {
        let handle = self.cleanup_task.write().await.take();

        if let Some(handle) = handle {
            self.shutdown_requested.store(true, Ordering::SeqCst);
            self.shutdown.notify_waiters();
            let _ = handle.await;
        }
    }

    /// Whether the periodic sweep is currently running
    pub async fn is_cleanup_running(&self) -> bool {
        self.cleanup_task.read().await.is_some()
    }

    /// Drop all nodes without emitting events (bulk reset)
    pub async fn clear(&self) {
        let mut nodes = self.nodes.write().await;
        nodes.clear();
        debug!("registry cleared");
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::io::MockClock;

    fn test_node_id(n: u32) -> NodeId {
        NodeId::new(format!("node-{}", n)).unwrap()
    }

    fn test_registration(n: u32) -> NodeRegistration {
        NodeRegistration::new(
            test_node_id(n),
            format!("worker-{}", n),
            format!("http://worker-{}:8080", n),
        )
        .with_region("us-east")
    }

    fn test_registry(initial_ms: u64) -> (NodeRegistry, Arc<MockClock>) {
        let clock = Arc::new(MockClock::new(initial_ms));
        let registry = NodeRegistry::with_providers(RegistryConfig::for_testing(), clock.clone());
        (registry, clock)
    }

    #[tokio::test]
    async fn test_register_round_trip() {
        let (registry, _clock) = test_registry(1000);

        registry.register(test_registration(1)).await;

        let node = registry.get_node(&test_node_id(1)).await.unwrap();
        assert_eq!(node.status, NodeStatus::Online);
        assert_eq!(node.last_seen_at_ms, 1000);
        assert_eq!(node.registered_at_ms, 1000);
    }

    #[tokio::test]
    async fn test_register_emits_registered_then_updated() {
        let (registry, _clock) = test_registry(1000);
        let mut rx = registry.subscribe();

        registry.register(test_registration(1)).await;
        assert!(matches!(
            rx.recv().await.unwrap(),
            RegistryEvent::Registered { .. }
        ));

        registry.register(test_registration(1)).await;
        assert!(matches!(
            rx.recv().await.unwrap(),
            RegistryEvent::Updated { .. }
        ));
    }

    #[tokio::test]
    async fn test_reregister_preserves_registered_at() {
        let (registry, clock) = test_registry(1000);

        registry.register(test_registration(1)).await;
        registry
            .set_node_status(&test_node_id(1), NodeStatus::Draining)
            .await;

        clock.advance(5000);
        let node = registry
            .register(test_registration(1).with_region("eu-west"))
            .await;

        assert_eq!(node.registered_at_ms, 1000);
        assert_eq!(node.last_seen_at_ms, 6000);
        assert_eq!(node.status, NodeStatus::Online);
        assert_eq!(node.region, "eu-west");
    }

    #[tokio::test]
    async fn test_deregister() {
        let (registry, _clock) = test_registry(1000);
        let mut rx = registry.subscribe();

        registry.register(test_registration(1)).await;

        assert!(registry.deregister(&test_node_id(1)).await);
        assert!(registry.get_node(&test_node_id(1)).await.is_none());

        // Second deregister is a no-op with no event
        assert!(!registry.deregister(&test_node_id(1)).await);

        assert!(matches!(
            rx.recv().await.unwrap(),
            RegistryEvent::Registered { .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            RegistryEvent::Deregistered { .. }
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_heartbeat_refreshes_last_seen() {
        let (registry, clock) = test_registry(1000);

        registry.register(test_registration(1)).await;

        clock.advance(300);
        assert!(registry.heartbeat(&test_node_id(1)).await);

        let node = registry.get_node(&test_node_id(1)).await.unwrap();
        assert_eq!(node.last_seen_at_ms, 1300);
    }

    #[tokio::test]
    async fn test_heartbeat_unknown_node() {
        let (registry, _clock) = test_registry(1000);
        assert!(!registry.heartbeat(&test_node_id(9)).await);
        assert_eq!(registry.node_count().await, 0);
    }

    #[tokio::test]
    async fn test_heartbeat_flips_offline_to_online() {
        let (registry, clock) = test_registry(1000);

        registry.register(test_registration(1)).await;
        registry
            .set_node_status(&test_node_id(1), NodeStatus::Offline)
            .await;

        clock.advance(100);
        assert!(registry.heartbeat(&test_node_id(1)).await);

        let node = registry.get_node(&test_node_id(1)).await.unwrap();
        assert_eq!(node.status, NodeStatus::Online);
    }

    #[tokio::test]
    async fn test_heartbeat_leaves_draining_alone() {
        let (registry, clock) = test_registry(1000);

        registry.register(test_registration(1)).await;
        registry
            .set_node_status(&test_node_id(1), NodeStatus::Draining)
            .await;

        clock.advance(100);
        assert!(registry.heartbeat(&test_node_id(1)).await);

        let node = registry.get_node(&test_node_id(1)).await.unwrap();
        assert_eq!(node.status, NodeStatus::Draining);
        assert_eq!(node.last_seen_at_ms, 1100);
    }

    #[tokio::test]
    async fn test_set_node_status_unknown() {
        let (registry, _clock) = test_registry(1000);
        assert!(
            !registry
                .set_node_status(&test_node_id(9), NodeStatus::Draining)
                .await
        );
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (registry, _clock) = test_registry(1000);

        registry.register(test_registration(1)).await;
        registry.register(test_registration(2)).await;
        registry
            .register(test_registration(3).with_region("eu-west"))
            .await;

        registry
            .set_node_status(&test_node_id(2), NodeStatus::Maintenance)
            .await;

        assert_eq!(registry.list_nodes().await.len(), 3);
        assert_eq!(
            registry.list_nodes_by_status(NodeStatus::Online).await.len(),
            2
        );
        assert_eq!(
            registry
                .list_nodes_by_status(NodeStatus::Maintenance)
                .await
                .len(),
            1
        );

        let eu_nodes = registry.list_nodes_by_region("eu-west").await;
        assert_eq!(eu_nodes.len(), 1);
        assert_eq!(eu_nodes[0].id, test_node_id(3));
        assert!(registry.list_nodes_by_region("ap-south").await.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_marks_stale_nodes_offline() {
        let (registry, clock) = test_registry(1000);

        registry.register(test_registration(1)).await;
        registry.register(test_registration(2)).await;

        // Node 2 keeps heartbeating, node 1 goes silent
        clock.advance(400);
        registry.heartbeat(&test_node_id(2)).await;
        clock.advance(200); // node 1 silent for 600ms > 500ms threshold

        let stale = registry.cleanup_stale_nodes().await;
        assert_eq!(stale, vec![test_node_id(1)]);

        let node = registry.get_node(&test_node_id(1)).await.unwrap();
        assert_eq!(node.status, NodeStatus::Offline);
        assert_eq!(
            registry.get_node(&test_node_id(2)).await.unwrap().status,
            NodeStatus::Online
        );
    }

    #[tokio::test]
    async fn test_cleanup_threshold_is_strict() {
        let (registry, clock) = test_registry(1000);

        registry.register(test_registration(1)).await;

        // Exactly at the threshold: not yet stale
        clock.advance(500);
        assert!(registry.cleanup_stale_nodes().await.is_empty());

        clock.advance(1);
        assert_eq!(
            registry.cleanup_stale_nodes().await,
            vec![test_node_id(1)]
        );
    }

    #[tokio::test]
    async fn test_cleanup_idempotent() {
        let (registry, clock) = test_registry(1000);
        let mut rx = registry.subscribe();

        registry.register(test_registration(1)).await;
        clock.advance(600);

        assert_eq!(registry.cleanup_stale_nodes().await.len(), 1);

        // A second sweep with no new heartbeats reports and emits nothing
        clock.advance(600);
        assert!(registry.cleanup_stale_nodes().await.is_empty());

        assert!(matches!(
            rx.recv().await.unwrap(),
            RegistryEvent::Registered { .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            RegistryEvent::Stale { .. }
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cleanup_ignores_non_online_nodes() {
        let (registry, clock) = test_registry(1000);

        registry.register(test_registration(1)).await;
        registry.register(test_registration(2)).await;
        registry
            .set_node_status(&test_node_id(1), NodeStatus::Draining)
            .await;
        registry
            .set_node_status(&test_node_id(2), NodeStatus::Maintenance)
            .await;

        clock.advance(10_000);
        assert!(registry.cleanup_stale_nodes().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_emits_nothing() {
        let (registry, _clock) = test_registry(1000);

        registry.register(test_registration(1)).await;
        registry.register(test_registration(2)).await;

        let mut rx = registry.subscribe();
        registry.clear().await;

        assert_eq!(registry.node_count().await, 0);
        assert!(rx.try_recv().is_err());
    }

    // The sweep-task tests run against the wall clock: MockClock's sleep
    // returns immediately, which would turn the sweep loop into a spin.
    fn wall_clock_registry() -> NodeRegistry {
        NodeRegistry::with_config(RegistryConfig::for_testing())
    }

    #[tokio::test]
    async fn test_start_cleanup_is_idempotent() {
        let registry = wall_clock_registry();

        assert!(registry.start_cleanup().await);
        assert!(registry.is_cleanup_running().await);

        // Second start is a no-op, not a second timer
        assert!(!registry.start_cleanup().await);

        registry.stop_cleanup().await;
        assert!(!registry.is_cleanup_running().await);
    }

    #[tokio::test]
    async fn test_stop_cleanup_safe_without_start() {
        let registry = wall_clock_registry();

        registry.stop_cleanup().await;
        registry.stop_cleanup().await;
        assert!(!registry.is_cleanup_running().await);
    }

    #[tokio::test]
    async fn test_cleanup_restarts_after_stop() {
        let registry = wall_clock_registry();

        assert!(registry.start_cleanup().await);
        registry.stop_cleanup().await;
        assert!(registry.start_cleanup().await);
        registry.stop_cleanup().await;
    }
}
