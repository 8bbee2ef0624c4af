//! Roster Core
//!
//! Core types, errors, and constants for the Roster cluster membership
//! system.
//!
//! # Overview
//!
//! Roster tracks which worker nodes exist in a cluster, whether they are
//! alive, and what their operational status is. This crate carries the
//! shared foundations:
//! - Explicit limit constants
//! - Core error type
//! - I/O abstraction (time and RNG providers) so the same logic runs
//!   against the wall clock in production and a controlled clock in tests
//! - Telemetry bootstrap
//!
//! # TigerStyle
//!
//! This crate follows [TigerStyle](https://github.com/tigerbeetle/tigerbeetle/blob/main/docs/TIGER_STYLE.md)
//! engineering principles:
//! - Safety > Performance > Developer Experience
//! - Explicit limits with big-endian naming (e.g., `NODE_ID_LENGTH_BYTES_MAX`)
//! - Bounded iteration only

pub mod constants;
pub mod error;
pub mod io;
pub mod telemetry;

pub use constants::*;
pub use error::{Error, Result};
pub use io::{MockClock, RngProvider, StdRngProvider, TimeProvider, WallClockTime};
pub use telemetry::{init_telemetry, TelemetryConfig};
