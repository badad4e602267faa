//! Message distribution: the router plus the collaborator seams it consumes.
//!
//! The router never owns connection or membership state. It reads through
//! [`Directory`], reports presence changes through [`Presence`], and writes
//! through [`DeliverySink`]; the in-process implementations live in
//! `crate::registry`.

pub mod router;

use async_trait::async_trait;

use relaygate_core::error::Result;
use relaygate_core::protocol::TransportMessage;

use crate::registry::{ConnId, Connection};

pub use router::{Delivery, MessageRouter, Recipient, RouteOutcome};

/// Read-only lookups shared by concurrent routes.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Live connection for `user`, if any.
    async fn lookup(&self, user: &str) -> Result<Option<Connection>>;
    /// Members of `group` (may be empty).
    async fn group_members(&self, group: &str) -> Result<Vec<String>>;
}

/// Connection-state collaborator driven by ONLINE/JOIN/LEAVE frames.
#[async_trait]
pub trait Presence: Send + Sync {
    /// Identify `conn` as `user`.
    async fn online(&self, conn: ConnId, user: &str) -> Result<()>;
    async fn join(&self, group: &str, user: &str) -> Result<()>;
    async fn leave(&self, group: &str, user: &str) -> Result<()>;
}

/// Direct write to a live connection.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn send(&self, conn: &Connection, message: &TransportMessage) -> Result<()>;
}
