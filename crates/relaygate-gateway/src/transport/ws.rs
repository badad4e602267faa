//! WebSocket transport.
//!
//! Binary messages are raw byte chunks for the frame decoder; a frame may
//! span several messages. Outbound frames go out as binary messages. Text
//! messages are not part of the protocol and are ignored.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::app_state::AppState;
use crate::transport::session::{CloseSignal, Session};

pub async fn ws_upgrade(
    State(app): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    if app.is_draining() {
        return (StatusCode::SERVICE_UNAVAILABLE, "draining").into_response();
    }
    ws.on_upgrade(move |socket| async move {
        let (session, outbound, close) = Session::open(&app, "ws");
        let span = tracing::info_span!("conn", id = %session.id(), %peer);
        run_session(socket, session, outbound, close).instrument(span).await;
    })
}

async fn run_session(
    socket: WebSocket,
    mut session: Session,
    mut outbound: mpsc::Receiver<Bytes>,
    mut close: CloseSignal,
) {
    tracing::info!("websocket connection accepted");
    let (mut ws_tx, mut ws_rx) = socket.split();

    // the read loop never writes; it may be parked in routing
    let writer_task = tokio::spawn(
        async move {
            while let Some(frame) = outbound.recv().await {
                if let Err(e) = ws_tx.send(Message::Binary(frame.to_vec())).await {
                    tracing::debug!(error = %e, "websocket send failed");
                    return;
                }
            }
            let _ = ws_tx.send(Message::Close(None)).await;
        }
        .in_current_span(),
    );

    let mut forced = false;
    loop {
        tokio::select! {
            _ = close.fired() => {
                forced = true;
                break;
            }

            incoming = ws_rx.next() => {
                let Some(Ok(msg)) = incoming else { break; };
                match msg {
                    Message::Binary(chunk) => {
                        if session.on_bytes(&chunk).await.is_err() {
                            forced = true;
                            break;
                        }
                    }
                    Message::Text(_) => tracing::debug!("text message ignored"),
                    Message::Ping(_) | Message::Pong(_) => {}
                    Message::Close(_) => break,
                }
            }
        }
    }

    drop(session);
    if forced {
        writer_task.abort();
    } else {
        let _ = writer_task.await;
    }
}
