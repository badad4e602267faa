//! Per-connection driver shared by the TCP and WebSocket transports.
//!
//! A [`Session`] owns the connection's decoder and feeds every decoded
//! message to the router in arrival order. Dropping it unregisters the
//! connection.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use relaygate_core::error::{ErrorKind, RelayError, Result};
use relaygate_core::protocol::{encode_to_bytes, FrameDecoder, ProtocolCategory, TransportMessage};

use crate::app_state::AppState;
use crate::distribute::MessageRouter;
use crate::obs::GatewayMetrics;
use crate::registry::{ConnId, Connection};

pub struct Session {
    conn: ConnId,
    tx: mpsc::Sender<Bytes>,
    decoder: FrameDecoder,
    router: Arc<MessageRouter>,
    metrics: Arc<GatewayMetrics>,
    app: AppState,
}

impl Session {
    /// Register a freshly accepted connection and arm its handshake timer.
    ///
    /// Returns the session, the receiving end of its outbound frame queue
    /// (for the transport's writer) and the forced-close signal.
    pub fn open(app: &AppState, transport: &'static str) -> (Self, mpsc::Receiver<Bytes>, CloseSignal) {
        let gw = &app.cfg().gateway;
        let sessions = app.sessions();
        let conn = sessions.next_id();

        let (tx, rx) = mpsc::channel(gw.outbound_queue);
        sessions.insert(Connection { id: conn, tx: tx.clone() });

        let (close_tx, close_rx) = oneshot::channel();
        app.liveness().arm(conn, gw.handshake_timeout(), move || {
            let _ = close_tx.send(());
        });

        let metrics = app.metrics();
        metrics.connections.inc(&[("transport", transport)]);
        metrics.connections_active.inc();

        let session = Self {
            conn,
            tx,
            decoder: FrameDecoder::new(app.cfg().decoder.limits()),
            router: app.router(),
            metrics,
            app: app.clone(),
        };
        (session, rx, CloseSignal { rx: close_rx, armed: true })
    }

    pub fn id(&self) -> ConnId {
        self.conn
    }

    /// Feed one inbound chunk. Every complete message is routed before this
    /// returns. An error means the connection must be closed.
    pub async fn on_bytes(&mut self, chunk: &[u8]) -> Result<()> {
        let Self {
            conn,
            tx,
            decoder,
            router,
            metrics,
            ..
        } = self;

        let skipped_before = decoder.skipped();
        let mut result = Ok(());
        let mut decoded = decoder.feed(chunk);
        for item in decoded.by_ref() {
            let message = match item {
                Ok(m) => m,
                Err(e) => {
                    metrics.decode_errors.inc(&[("kind", e.kind().as_str())]);
                    tracing::warn!(%conn, error = %e, "frame rejected, closing connection");
                    result = Err(e);
                    break;
                }
            };

            metrics.frames_decoded.inc(&[("category", message.category.as_str())]);
            if message.discard {
                metrics.decode_errors.inc(&[("kind", ErrorKind::Framing.as_str())]);
            } else if message.category == ProtocolCategory::Ping {
                pong(*conn, tx, metrics, message.client_type)?;
            }
            router.route(*conn, message).await;
        }
        drop(decoded);

        let skipped = decoder.skipped() - skipped_before;
        if skipped > 0 {
            tracing::debug!(%conn, skipped, "unknown header bytes skipped");
            metrics.decode_errors.add(&[("kind", "UNKNOWN_CATEGORY")], skipped);
        }
        result
    }
}

/// Queue a PING reply without waiting: this task may be the one that drains
/// the queue. A full queue drops the reply; a closed one ends the session.
fn pong(conn: ConnId, tx: &mpsc::Sender<Bytes>, metrics: &GatewayMetrics, client_type: u8) -> Result<()> {
    let frame = encode_to_bytes(&TransportMessage::ping(client_type))?;
    match tx.try_send(frame) {
        Ok(()) => Ok(()),
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!(%conn, "outbound queue full, ping reply dropped");
            metrics.deliveries.inc(&[("outcome", "pong_dropped")]);
            Ok(())
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            Err(RelayError::Delivery(format!("{conn} outbound queue closed")))
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.app.sessions().remove(self.conn);
        self.app.liveness().release(self.conn);
        self.metrics.connections_active.dec();
        tracing::info!(conn = %self.conn, "connection closed");
    }
}

/// Resolves when the handshake timer closes the connection. Stays pending
/// forever once the close was cancelled.
pub struct CloseSignal {
    rx: oneshot::Receiver<()>,
    armed: bool,
}

impl CloseSignal {
    pub async fn fired(&mut self) {
        if self.armed {
            let fired = (&mut self.rx).await.is_ok();
            self.armed = false;
            if fired {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}
