//! Top-level facade crate for relaygate.
//!
//! Re-exports the protocol core and the gateway library so users can depend on a single crate.

pub mod core {
    pub use relaygate_core::*;
}

pub mod gateway {
    pub use relaygate_gateway::*;
}
