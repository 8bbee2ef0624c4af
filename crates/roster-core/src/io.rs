//! I/O Abstraction Layer for Deterministic Testing
//!
//! TigerStyle: All external I/O goes through abstraction traits.
//!
//! The registry and status manager reason about time constantly: heartbeat
//! freshness, uptime accounting, stale detection. Going through a trait
//! instead of the system clock means the same logic runs in production and
//! under a controlled clock in tests:
//!
//! - **Time**: Wall clock vs manually-advanced mock clock
//! - **Random**: System-seeded vs seeded deterministic RNG

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

// ============================================================================
// Time Provider
// ============================================================================

/// Time provider abstraction
///
/// All code that needs current time or sleep MUST use this trait.
/// Never use `std::time::SystemTime::now()` directly.
///
/// # Implementations
///
/// - `WallClockTime`: Production - uses system clock
/// - `MockClock`: Tests - manually advanced
#[async_trait]
pub trait TimeProvider: Send + Sync + std::fmt::Debug {
    /// Get current time in milliseconds since epoch
    fn now_ms(&self) -> u64;

    /// Sleep for the specified duration
    ///
    /// In production: actual tokio::time::sleep
    /// In tests: advances the mock clock, returns immediately
    async fn sleep_ms(&self, ms: u64);
}

/// Production time provider using wall clock
#[derive(Debug, Clone, Default)]
pub struct WallClockTime;

impl WallClockTime {
    /// Create a new wall clock time provider
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TimeProvider for WallClockTime {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    async fn sleep_ms(&self, ms: u64) {
        tokio::time::sleep(tokio::time::Duration::from_millis(ms)).await;
    }
}

/// Manually-advanced clock for tests
///
/// `sleep_ms` advances the clock instead of waiting, so time-dependent
/// logic (staleness, uptime) can be driven without real delays.
#[derive(Debug)]
pub struct MockClock {
    time_ms: AtomicU64,
}

impl MockClock {
    /// Create a new mock clock starting at the given timestamp
    pub fn new(initial_ms: u64) -> Self {
        Self {
            time_ms: AtomicU64::new(initial_ms),
        }
    }

    /// Advance time by the given milliseconds
    pub fn advance(&self, ms: u64) {
        self.time_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Set time to a specific value
    pub fn set(&self, ms: u64) {
        self.time_ms.store(ms, Ordering::SeqCst);
    }
}

#[async_trait]
impl TimeProvider for MockClock {
    fn now_ms(&self) -> u64 {
        self.time_ms.load(Ordering::SeqCst)
    }

    async fn sleep_ms(&self, ms: u64) {
        self.advance(ms);
    }
}

// ============================================================================
// RNG Provider
// ============================================================================

/// Random number generator abstraction
///
/// Used for generated node IDs. Never use `rand::thread_rng()` directly.
pub trait RngProvider: Send + Sync + std::fmt::Debug {
    /// Generate a random u64
    fn next_u64(&self) -> u64;
}

/// Production RNG provider seeded from system time
///
/// Uses an atomic counter for thread-safety without locks.
/// Not cryptographically secure - use for non-security randomness only.
#[derive(Debug)]
pub struct StdRngProvider {
    state: AtomicU64,
}

impl Default for StdRngProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StdRngProvider {
    /// Create a new RNG provider seeded from system time
    pub fn new() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        Self {
            state: AtomicU64::new(seed | 1),
        }
    }

    /// Create with specific seed (for testing)
    pub fn with_seed(seed: u64) -> Self {
        Self {
            state: AtomicU64::new(seed | 1),
        }
    }
}

impl RngProvider for StdRngProvider {
    fn next_u64(&self) -> u64 {
        // xorshift64* with a CAS loop over the shared state
        let mut state = self.state.load(Ordering::Relaxed);
        loop {
            let mut x = state;
            x ^= x >> 12;
            x ^= x << 25;
            x ^= x >> 27;

            match self
                .state
                .compare_exchange_weak(state, x, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return x.wrapping_mul(0x2545F4914F6CDD1D),
                Err(s) => state = s,
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wall_clock_time_now_ms() {
        let clock = WallClockTime::new();
        let now = clock.now_ms();

        // Should be a reasonable timestamp (after 2020)
        assert!(now > 1577836800000); // Jan 1, 2020

        let now2 = clock.now_ms();
        assert!(now2 >= now);
        assert!(now2 - now < 1000);
    }

    #[tokio::test]
    async fn test_wall_clock_time_sleep() {
        let clock = WallClockTime::new();
        let start = clock.now_ms();

        clock.sleep_ms(10).await;

        let elapsed = clock.now_ms() - start;
        assert!(elapsed >= 9, "elapsed: {}", elapsed);
    }

    #[tokio::test]
    async fn test_mock_clock_advance() {
        let clock = MockClock::new(1000);
        assert_eq!(clock.now_ms(), 1000);

        clock.advance(500);
        assert_eq!(clock.now_ms(), 1500);

        clock.sleep_ms(250).await;
        assert_eq!(clock.now_ms(), 1750);

        clock.set(10_000);
        assert_eq!(clock.now_ms(), 10_000);
    }

    #[test]
    fn test_std_rng_provider_deterministic_with_seed() {
        let rng1 = StdRngProvider::with_seed(12345);
        let rng2 = StdRngProvider::with_seed(12345);

        assert_eq!(rng1.next_u64(), rng2.next_u64());
    }

    #[test]
    fn test_std_rng_provider_varies() {
        let rng = StdRngProvider::with_seed(42);
        let a = rng.next_u64();
        let b = rng.next_u64();
        assert_ne!(a, b);
    }
}
