use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;

use relaygate_core::error::RelayError;
use relaygate_core::protocol::{OfflineMessage, ProtocolCategory, TransportMessage};

use crate::distribute::{DeliverySink, Directory, Presence};
use crate::liveness::{Confirm, LivenessSupervisor};
use crate::obs::GatewayMetrics;
use crate::offline::OfflinePipeline;
use crate::registry::ConnId;

/// Per-recipient result: exactly one per recipient of a ONE/GROUP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Accepted by the recipient's live connection.
    Delivered,
    /// Handed to the offline pipeline.
    Queued,
    /// Neither: the offline pipeline refused it (full or closed).
    Lost,
}

impl Delivery {
    pub fn as_str(self) -> &'static str {
        match self {
            Delivery::Delivered => "delivered",
            Delivery::Queued => "queued",
            Delivery::Lost => "lost",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub user_id: String,
    pub delivery: Delivery,
}

/// What `route` did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Discarded,
    Online(Confirm),
    /// Presence change (JOIN/LEAVE) applied.
    Membership,
    /// ONE/GROUP fan-out, one entry per recipient.
    Fanout(Vec<Recipient>),
    /// No action at this layer (PING, GROUPACK, ACCEPT).
    PassThrough,
    /// The message could not be acted on; already logged.
    Failed,
}

/// Distribution router: direct delivery with per-recipient offline fallback,
/// presence updates and liveness confirmation.
pub struct MessageRouter {
    directory: Arc<dyn Directory>,
    presence: Arc<dyn Presence>,
    sink: Arc<dyn DeliverySink>,
    offline: OfflinePipeline,
    liveness: Arc<LivenessSupervisor>,
    metrics: Arc<GatewayMetrics>,
}

impl MessageRouter {
    pub fn new(
        directory: Arc<dyn Directory>,
        presence: Arc<dyn Presence>,
        sink: Arc<dyn DeliverySink>,
        offline: OfflinePipeline,
        liveness: Arc<LivenessSupervisor>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            directory,
            presence,
            sink,
            offline,
            liveness,
            metrics,
        }
    }

    pub fn offline(&self) -> &OfflinePipeline {
        &self.offline
    }

    /// Route one decoded message received on `conn`. Never fails: delivery
    /// problems become offline fallbacks, everything else is logged.
    pub async fn route(&self, conn: ConnId, message: TransportMessage) -> RouteOutcome {
        let started = Instant::now();
        let category = message.category;
        let outcome = self.route_inner(conn, message).await;
        self.metrics
            .route_duration
            .observe(&[("category", category.as_str())], started.elapsed());
        outcome
    }

    async fn route_inner(&self, conn: ConnId, message: TransportMessage) -> RouteOutcome {
        if message.discard {
            tracing::info!(%conn, category = %message.category, "message is discard");
            return RouteOutcome::Discarded;
        }

        match message.category {
            ProtocolCategory::Online => self.online(conn, &message).await,
            ProtocolCategory::One => {
                let Some(to) = message.as_body().map(|b| b.to.clone()) else {
                    return missing_body(conn, &message);
                };
                let delivery = self.deliver(&to, &message).await;
                RouteOutcome::Fanout(vec![Recipient { user_id: to, delivery }])
            }
            ProtocolCategory::Group => self.group(conn, &message).await,
            ProtocolCategory::Join | ProtocolCategory::Leave => self.membership(conn, &message).await,
            ProtocolCategory::Ping
            | ProtocolCategory::GroupAck
            | ProtocolCategory::Accept
            | ProtocolCategory::Unknown(_) => {
                tracing::trace!(%conn, category = %message.category, "pass-through");
                RouteOutcome::PassThrough
            }
        }
    }

    async fn online(&self, conn: ConnId, message: &TransportMessage) -> RouteOutcome {
        let Some(body) = message.as_body() else {
            return missing_body(conn, message);
        };
        // the close is only cancelled once the connection state is initialised
        if let Err(e) = self.presence.online(conn, &body.from).await {
            tracing::warn!(%conn, user = %body.from, error = %e, "online init failed");
            return RouteOutcome::Failed;
        }
        RouteOutcome::Online(self.liveness.confirm(conn))
    }

    async fn membership(&self, conn: ConnId, message: &TransportMessage) -> RouteOutcome {
        let Some(body) = message.as_body() else {
            return missing_body(conn, message);
        };
        let res = if message.category == ProtocolCategory::Join {
            self.presence.join(&body.to, &body.from).await
        } else {
            self.presence.leave(&body.to, &body.from).await
        };
        match res {
            Ok(()) => RouteOutcome::Membership,
            Err(e) => {
                tracing::warn!(%conn, group = %body.to, user = %body.from, error = %e, "membership change failed");
                RouteOutcome::Failed
            }
        }
    }

    async fn group(&self, conn: ConnId, message: &TransportMessage) -> RouteOutcome {
        let Some(body) = message.as_body() else {
            return missing_body(conn, message);
        };
        let members = match self.directory.group_members(&body.to).await {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(%conn, group = %body.to, error = %e, "group lookup failed");
                Vec::new()
            }
        };

        // each member resolves independently; one failure never stalls the rest
        let mut pending: FuturesUnordered<_> = members
            .into_iter()
            .map(|user_id| async move {
                let delivery = self.deliver(&user_id, message).await;
                Recipient { user_id, delivery }
            })
            .collect();

        let mut recipients = Vec::with_capacity(pending.len());
        while let Some(r) = pending.next().await {
            recipients.push(r);
        }
        tracing::debug!(%conn, group = %body.to, members = recipients.len(), "group fan-out done");
        RouteOutcome::Fanout(recipients)
    }

    /// Direct delivery to `user`, falling back to the offline pipeline.
    async fn deliver(&self, user: &str, message: &TransportMessage) -> Delivery {
        let attempt = match self.directory.lookup(user).await {
            Ok(Some(conn)) => self.sink.send(&conn, message).await,
            Ok(None) => Err(RelayError::NotConnected(user.to_string())),
            Err(e) => Err(e),
        };

        let delivery = match attempt {
            Ok(()) => Delivery::Delivered,
            Err(e) => {
                tracing::debug!(user, error = %e, "direct delivery failed, queueing offline");
                match self.offline.enqueue(OfflineMessage::new(user, message.clone())).await {
                    Ok(()) => Delivery::Queued,
                    Err(e) => {
                        tracing::error!(user, error = %e, "offline enqueue failed, message lost");
                        Delivery::Lost
                    }
                }
            }
        };
        self.metrics.deliveries.inc(&[("outcome", delivery.as_str())]);
        delivery
    }
}

fn missing_body(conn: ConnId, message: &TransportMessage) -> RouteOutcome {
    tracing::warn!(%conn, category = %message.category, "message without body payload");
    RouteOutcome::Failed
}
