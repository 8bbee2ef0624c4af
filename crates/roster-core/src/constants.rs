//! TigerStyle constants for Roster
//!
//! All limits are explicit, use big-endian naming (most significant first),
//! and include units in the name.

// =============================================================================
// Node Limits
// =============================================================================

/// Maximum length of a node ID in bytes
pub const NODE_ID_LENGTH_BYTES_MAX: usize = 128;

/// Maximum number of nodes in a cluster
pub const CLUSTER_NODES_COUNT_MAX: usize = 1000;

// =============================================================================
// Liveness
// =============================================================================

/// Default threshold before a silent node is considered stale (1 min)
pub const STALE_THRESHOLD_MS_DEFAULT: u64 = 60 * 1000;

/// Default interval between stale-node sweeps (30 sec)
pub const CLEANUP_INTERVAL_MS_DEFAULT: u64 = 30 * 1000;

/// Minimum stale-node sweep interval in milliseconds
pub const CLEANUP_INTERVAL_MS_MIN: u64 = 100;

/// Maximum stale-node sweep interval in milliseconds (10 min)
pub const CLEANUP_INTERVAL_MS_MAX: u64 = 10 * 60 * 1000;

// =============================================================================
// Status Tracking
// =============================================================================

/// Default cap on retained status transitions per node
pub const STATUS_HISTORY_LENGTH_MAX_DEFAULT: usize = 100;

/// Hard cap on retained status transitions per node
pub const STATUS_HISTORY_LENGTH_MAX: usize = 10_000;

/// Maximum length of a transition reason in bytes
pub const TRANSITION_REASON_LENGTH_BYTES_MAX: usize = 1024;

// =============================================================================
// Events
// =============================================================================

/// Default capacity of a component's event broadcast channel
pub const EVENT_CHANNEL_CAPACITY_DEFAULT: usize = 1024;

// Compile-time assertions for constant validity
const _: () = {
    assert!(NODE_ID_LENGTH_BYTES_MAX >= 64);
    assert!(CLUSTER_NODES_COUNT_MAX >= 1);
    assert!(STALE_THRESHOLD_MS_DEFAULT > CLEANUP_INTERVAL_MS_DEFAULT);
    assert!(CLEANUP_INTERVAL_MS_MIN < CLEANUP_INTERVAL_MS_MAX);
    assert!(STATUS_HISTORY_LENGTH_MAX_DEFAULT <= STATUS_HISTORY_LENGTH_MAX);
    assert!(EVENT_CHANNEL_CAPACITY_DEFAULT >= 16);
};
