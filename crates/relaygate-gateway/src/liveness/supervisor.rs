use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::AbortHandle;

use crate::obs::GatewayMetrics;
use crate::registry::ConnId;

const PENDING: u8 = 0;
const CANCELLED: u8 = 1;
const FIRED: u8 = 2;

/// State of a connection's forced-close timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseState {
    Pending,
    /// ONLINE arrived in time. Terminal.
    Cancelled,
    /// Timer elapsed and the connection was closed. Terminal.
    Fired,
}

/// Result of [`LivenessSupervisor::confirm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirm {
    /// This call cancelled the pending close.
    Confirmed,
    AlreadyConfirmed,
    /// Too late: the timer already fired.
    AlreadyClosed,
    /// No timer armed for this connection.
    Unknown,
}

impl Confirm {
    pub fn as_str(self) -> &'static str {
        match self {
            Confirm::Confirmed => "confirmed",
            Confirm::AlreadyConfirmed => "already_confirmed",
            Confirm::AlreadyClosed => "already_closed",
            Confirm::Unknown => "unknown",
        }
    }
}

/// One armed timer. Every transition out of `PENDING` is a single
/// compare-exchange, so cancel and fire cannot both win.
struct PendingClose {
    state: AtomicU8,
    timer: OnceLock<AbortHandle>,
}

impl PendingClose {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(PENDING),
            timer: OnceLock::new(),
        }
    }

    fn transition(&self, to: u8) -> Result<(), u8> {
        self.state
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
    }

    fn state(&self) -> CloseState {
        match self.state.load(Ordering::Acquire) {
            PENDING => CloseState::Pending,
            CANCELLED => CloseState::Cancelled,
            _ => CloseState::Fired,
        }
    }
}

/// Tracks forced-close timers per connection.
pub struct LivenessSupervisor {
    pending: DashMap<ConnId, Arc<PendingClose>>,
    metrics: Arc<GatewayMetrics>,
}

impl LivenessSupervisor {
    pub fn new(metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            pending: DashMap::new(),
            metrics,
        }
    }

    /// Arm the forced close for `conn`: after `timeout`, unless confirmed,
    /// `on_close` runs exactly once. Must be called from a tokio runtime.
    pub fn arm<F>(&self, conn: ConnId, timeout: Duration, on_close: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let pending = Arc::new(PendingClose::new());
        self.pending.insert(conn, Arc::clone(&pending));

        let fired = Arc::clone(&pending);
        let metrics = Arc::clone(&self.metrics);
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if fired.transition(FIRED).is_ok() {
                tracing::info!(%conn, ?timeout, "no ONLINE before deadline, closing connection");
                metrics.liveness.inc(&[("outcome", "timed_out")]);
                on_close();
            }
        });
        let _ = pending.timer.set(task.abort_handle());
    }

    /// Cancel the pending close for `conn`. Safe to call any number of times.
    pub fn confirm(&self, conn: ConnId) -> Confirm {
        let Some(pending) = self.pending.get(&conn).map(|e| Arc::clone(e.value())) else {
            return Confirm::Unknown;
        };

        let outcome = match pending.transition(CANCELLED) {
            Ok(()) => {
                if let Some(timer) = pending.timer.get() {
                    timer.abort();
                }
                Confirm::Confirmed
            }
            Err(CANCELLED) => Confirm::AlreadyConfirmed,
            Err(_) => Confirm::AlreadyClosed,
        };
        tracing::debug!(%conn, outcome = outcome.as_str(), "liveness confirm");
        self.metrics.liveness.inc(&[("outcome", outcome.as_str())]);
        outcome
    }

    pub fn state(&self, conn: ConnId) -> Option<CloseState> {
        self.pending.get(&conn).map(|e| e.value().state())
    }

    /// Forget `conn` (on disconnect). A still pending timer is aborted.
    pub fn release(&self, conn: ConnId) {
        if let Some((_, pending)) = self.pending.remove(&conn) {
            if pending.transition(CANCELLED).is_ok() {
                if let Some(timer) = pending.timer.get() {
                    timer.abort();
                }
            }
        }
    }

    pub fn tracked(&self) -> usize {
        self.pending.len()
    }
}
