//! relaygate gateway library entry.
//!
//! Wires the transports, the distribution router, liveness supervision and
//! the offline pipeline into one gateway stack. Consumed by the binary
//! (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod distribute;
pub mod liveness;
pub mod obs;
pub mod offline;
pub mod ops;
pub mod registry;
pub mod router;
pub mod transport;
