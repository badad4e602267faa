//! Connection liveness: connections that never send ONLINE are closed after
//! a fixed handshake timeout.

mod supervisor;

pub use supervisor::{CloseState, Confirm, LivenessSupervisor};
