//! In-process connection and group state.
//!
//! Session registry, group membership, and the `LocalDirectory`/`ChannelSink`
//! adapters that expose them to the distribution router.

mod groups;
mod local;
mod session_registry;

pub use groups::GroupStore;
pub use local::{ChannelSink, LocalDirectory};
pub use session_registry::{ConnId, Connection, SessionRegistry};
