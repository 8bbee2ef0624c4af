//! End-to-end lifecycle tests driving the registry and status manager
//! together, the way a control plane would.

use roster_core::io::MockClock;
use roster_registry::{
    NodeId, NodeRegistration, NodeRegistry, NodeStatus, RegistryConfig, RegistryError,
    RegistryEvent, StatusConfig, StatusEvent, StatusManager,
};
use std::sync::Arc;
use std::time::Duration;

fn registration(id: &str, region: &str) -> NodeRegistration {
    NodeRegistration::new(
        NodeId::new(id).unwrap(),
        id,
        format!("http://{}:8080", id),
    )
    .with_region(region)
    .with_capability("git")
}

#[tokio::test]
async fn test_worker_lifecycle_with_layered_status_tracking() {
    let clock = Arc::new(MockClock::new(1_000_000));
    let registry = NodeRegistry::with_providers(
        RegistryConfig::default().with_stale_threshold(60_000),
        clock.clone(),
    );
    let status = StatusManager::with_providers(StatusConfig::default(), clock.clone());

    let node_id = NodeId::new("worker-1").unwrap();

    // Worker joins: registry upsert plus strict tracking
    registry.register(registration("worker-1", "us-east")).await;
    status.init_node(node_id.clone()).await;

    // Heartbeats keep it fresh
    for _ in 0..5 {
        clock.advance(10_000);
        assert!(registry.heartbeat(&node_id).await);
    }
    assert!(registry.cleanup_stale_nodes().await.is_empty());

    // Administrative drain flows through both layers
    let transition = status
        .transition(&node_id, NodeStatus::Draining, "deploy")
        .await
        .unwrap();
    assert_eq!(transition.from, NodeStatus::Online);
    assert!(registry.set_node_status(&node_id, NodeStatus::Draining).await);

    // A drained node cannot jump to maintenance
    let rejected = status
        .transition(&node_id, NodeStatus::Maintenance, "")
        .await;
    assert!(matches!(
        rejected,
        Err(RegistryError::InvalidTransition { .. })
    ));

    // Uptime covers exactly the online span (50s of heartbeats)
    assert_eq!(status.get_uptime(&node_id).await, 50_000);

    // Drain completes, worker comes back
    clock.advance(5_000);
    status
        .transition(&node_id, NodeStatus::Online, "deploy complete")
        .await
        .unwrap();
    assert!(registry.heartbeat(&node_id).await);
    assert_eq!(
        registry.get_node(&node_id).await.unwrap().status,
        NodeStatus::Draining
    );
    registry.set_node_status(&node_id, NodeStatus::Online).await;

    // Worker leaves
    assert!(registry.deregister(&node_id).await);
    assert!(status.remove_node(&node_id).await);
    assert_eq!(registry.node_count().await, 0);
}

#[tokio::test]
async fn test_silent_worker_goes_stale_and_recovers() {
    let clock = Arc::new(MockClock::new(0));
    let registry = NodeRegistry::with_providers(RegistryConfig::default(), clock.clone());
    let mut events = registry.subscribe();

    let node_id = NodeId::new("worker-2").unwrap();
    registry.register(registration("worker-2", "us-west")).await;

    // Silent past the 60s default threshold
    clock.advance(61_000);
    assert_eq!(registry.cleanup_stale_nodes().await, vec![node_id.clone()]);
    assert_eq!(
        registry.get_node(&node_id).await.unwrap().status,
        NodeStatus::Offline
    );

    // Heartbeat resurrects it
    assert!(registry.heartbeat(&node_id).await);
    assert_eq!(
        registry.get_node(&node_id).await.unwrap().status,
        NodeStatus::Online
    );

    // Event stream saw: registered, stale, updated
    assert!(matches!(
        events.recv().await.unwrap(),
        RegistryEvent::Registered { .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        RegistryEvent::Stale { .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        RegistryEvent::Updated { .. }
    ));
}

#[tokio::test]
async fn test_status_events_arrive_in_emission_order() {
    let clock = Arc::new(MockClock::new(0));
    let status = StatusManager::with_providers(StatusConfig::default(), clock.clone());
    let node_id = NodeId::new("worker-3").unwrap();

    let mut events = status.subscribe();

    status.init_node(node_id.clone()).await;
    clock.advance(100);
    status
        .transition(&node_id, NodeStatus::Maintenance, "patching")
        .await
        .unwrap();

    assert!(matches!(
        events.recv().await.unwrap(),
        StatusEvent::Online { .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        StatusEvent::Changed(_)
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        StatusEvent::Maintenance { .. }
    ));
}

#[tokio::test]
async fn test_periodic_sweep_flips_silent_node() {
    // Real clock: the sweep task sleeps against it
    let registry = NodeRegistry::with_config(
        RegistryConfig::default()
            .with_stale_threshold(150)
            .with_cleanup_interval(100),
    );
    let mut events = registry.subscribe();

    let node_id = NodeId::new("worker-4").unwrap();
    registry.register(registration("worker-4", "us-east")).await;

    assert!(registry.start_cleanup().await);

    // Wait long enough for the node to go stale and a sweep to run
    tokio::time::sleep(Duration::from_millis(400)).await;

    registry.stop_cleanup().await;

    assert_eq!(
        registry.get_node(&node_id).await.unwrap().status,
        NodeStatus::Offline
    );

    assert!(matches!(
        events.recv().await.unwrap(),
        RegistryEvent::Registered { .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        RegistryEvent::Stale { .. }
    ));
}
