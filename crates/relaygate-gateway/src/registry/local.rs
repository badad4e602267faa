use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::error::SendTimeoutError;

use relaygate_core::error::{RelayError, Result};
use relaygate_core::protocol::{encode_to_bytes, TransportMessage};

use crate::distribute::{DeliverySink, Directory, Presence};
use crate::registry::{ConnId, Connection, GroupStore, SessionRegistry};

/// In-process directory over the session registry and group store.
#[derive(Clone)]
pub struct LocalDirectory {
    sessions: Arc<SessionRegistry>,
    groups: Arc<GroupStore>,
}

impl LocalDirectory {
    pub fn new(sessions: Arc<SessionRegistry>, groups: Arc<GroupStore>) -> Self {
        Self { sessions, groups }
    }
}

#[async_trait]
impl Directory for LocalDirectory {
    async fn lookup(&self, user: &str) -> Result<Option<Connection>> {
        Ok(self.sessions.user_connection(user))
    }

    async fn group_members(&self, group: &str) -> Result<Vec<String>> {
        Ok(self.groups.members(group))
    }
}

#[async_trait]
impl Presence for LocalDirectory {
    async fn online(&self, conn: ConnId, user: &str) -> Result<()> {
        if user.is_empty() {
            return Err(RelayError::Framing("ONLINE without user id".into()));
        }
        if !self.sessions.bind_user(conn, user) {
            return Err(RelayError::NotConnected(conn.to_string()));
        }
        tracing::info!(%conn, user, "user online");
        Ok(())
    }

    async fn join(&self, group: &str, user: &str) -> Result<()> {
        self.groups.join(group, user);
        tracing::debug!(group, user, "joined group");
        Ok(())
    }

    async fn leave(&self, group: &str, user: &str) -> Result<()> {
        self.groups.leave(group, user);
        tracing::debug!(group, user, "left group");
        Ok(())
    }
}

/// Writes encoded frames into the connection's outbound queue.
///
/// A frame accepted by the queue counts as delivered; the writer task owns
/// the socket from there.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    send_timeout: Option<Duration>,
}

impl ChannelSink {
    /// `None` waits for queue space indefinitely.
    pub fn new(send_timeout: Option<Duration>) -> Self {
        Self { send_timeout }
    }
}

#[async_trait]
impl DeliverySink for ChannelSink {
    async fn send(&self, conn: &Connection, message: &TransportMessage) -> Result<()> {
        let frame = encode_to_bytes(message)?;
        match self.send_timeout {
            Some(t) => conn.tx.send_timeout(frame, t).await.map_err(|e| match e {
                SendTimeoutError::Timeout(_) => RelayError::Delivery(format!("{} send timed out", conn.id)),
                SendTimeoutError::Closed(_) => RelayError::Delivery(format!("{} closed", conn.id)),
            }),
            None => conn
                .tx
                .send(frame)
                .await
                .map_err(|_| RelayError::Delivery(format!("{} closed", conn.id))),
        }
    }
}
