//! Offline fallback: the ordered pipeline the router writes into and the
//! store-facing drain that consumes it.

mod pipeline;
mod store;

pub use pipeline::{OfflineConsumer, OfflinePipeline};
pub use store::{spawn_drain, MemoryOfflineStore, OfflineRecord, OfflineStore};
