//! Raw TCP transport: one task per accepted socket.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::app_state::AppState;
use crate::transport::session::{CloseSignal, Session};

const READ_CHUNK: usize = 8 * 1024;

/// Accept loop. Accept errors are logged and skipped.
pub async fn serve(app: AppState, listener: TcpListener) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "tcp accept failed");
                continue;
            }
        };
        if app.is_draining() {
            tracing::debug!(%peer, "draining, refusing connection");
            continue;
        }
        let _ = stream.set_nodelay(true);

        let (session, outbound, close) = Session::open(&app, "tcp");
        let span = tracing::info_span!("conn", id = %session.id(), %peer);
        tokio::spawn(run_connection(stream, peer, session, outbound, close).instrument(span));
    }
}

async fn run_connection(
    stream: TcpStream,
    peer: SocketAddr,
    mut session: Session,
    mut outbound: mpsc::Receiver<Bytes>,
    mut close: CloseSignal,
) {
    tracing::info!(%peer, "connection accepted");
    let (mut reader, mut writer) = stream.into_split();

    let writer_task = tokio::spawn(
        async move {
            while let Some(frame) = outbound.recv().await {
                if let Err(e) = writer.write_all(&frame).await {
                    tracing::debug!(error = %e, "write failed");
                    break;
                }
            }
            let _ = writer.shutdown().await;
        }
        .in_current_span(),
    );

    let mut buf = vec![0u8; READ_CHUNK];
    let mut forced = false;
    loop {
        tokio::select! {
            _ = close.fired() => {
                forced = true;
                break;
            }
            read = reader.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => {
                    if session.on_bytes(&buf[..n]).await.is_err() {
                        forced = true;
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "read failed");
                    break;
                }
            }
        }
    }

    // unregisters the connection; the writer ends once queued frames are flushed
    drop(session);
    if forced {
        writer_task.abort();
    } else {
        let _ = writer_task.await;
    }
}
