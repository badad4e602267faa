use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use relaygate_core::error::{RelayError, Result};
use relaygate_core::protocol::OfflineMessage;

use crate::config::{OfflineSection, OverflowPolicy};

#[derive(Clone)]
enum Tx {
    Bounded(mpsc::Sender<OfflineMessage>, OverflowPolicy),
    Unbounded(mpsc::UnboundedSender<OfflineMessage>),
}

enum Rx {
    Bounded(mpsc::Receiver<OfflineMessage>),
    Unbounded(mpsc::UnboundedReceiver<OfflineMessage>),
}

/// Ordered hand-off of messages whose recipient could not be reached.
///
/// Cloning yields another producer handle on the same queue. Messages
/// accumulate until the single consumer attaches.
#[derive(Clone)]
pub struct OfflinePipeline {
    tx: Tx,
    consumer: Arc<Mutex<Option<Rx>>>,
    queued: Arc<AtomicUsize>,
}

impl OfflinePipeline {
    pub fn new(cfg: &OfflineSection) -> Self {
        match cfg.capacity {
            Some(capacity) => Self::bounded(capacity, cfg.overflow),
            None => Self::unbounded(),
        }
    }

    pub fn unbounded() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Tx::Unbounded(tx),
            consumer: Arc::new(Mutex::new(Some(Rx::Unbounded(rx)))),
            queued: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn bounded(capacity: usize, overflow: OverflowPolicy) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx: Tx::Bounded(tx, overflow),
            consumer: Arc::new(Mutex::new(Some(Rx::Bounded(rx)))),
            queued: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue `msg` for the consumer.
    ///
    /// Unbounded pipelines never wait. Bounded ones wait for room (`Block`) or
    /// fail with `PipelineFull` (`Reject`). Nothing is dropped silently.
    pub async fn enqueue(&self, msg: OfflineMessage) -> Result<()> {
        // counted before the send so a fast consumer never sees it underflow
        self.queued.fetch_add(1, Ordering::Relaxed);
        let sent = match &self.tx {
            Tx::Unbounded(tx) => tx.send(msg).map_err(|_| RelayError::PipelineClosed),
            Tx::Bounded(tx, OverflowPolicy::Block) => {
                tx.send(msg).await.map_err(|_| RelayError::PipelineClosed)
            }
            Tx::Bounded(tx, OverflowPolicy::Reject) => tx.try_send(msg).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => RelayError::PipelineFull,
                mpsc::error::TrySendError::Closed(_) => RelayError::PipelineClosed,
            }),
        };
        if sent.is_err() {
            self.queued.fetch_sub(1, Ordering::Relaxed);
        }
        sent
    }

    /// Take the consumer side. Only the first call succeeds.
    pub fn attach(&self) -> Result<OfflineConsumer> {
        let mut slot = self
            .consumer
            .lock()
            .map_err(|_| RelayError::Internal("offline consumer slot poisoned".into()))?;
        let rx = slot.take().ok_or(RelayError::ConsumerAttached)?;
        Ok(OfflineConsumer {
            rx,
            queued: Arc::clone(&self.queued),
        })
    }

    /// Whether the consumer side has been taken.
    pub fn is_attached(&self) -> bool {
        self.consumer.lock().map(|slot| slot.is_none()).unwrap_or(false)
    }

    /// Messages queued (or waiting for room) and not yet received.
    pub fn backlog(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }
}

/// The single consumer of an [`OfflinePipeline`].
pub struct OfflineConsumer {
    rx: Rx,
    queued: Arc<AtomicUsize>,
}

impl OfflineConsumer {
    /// Next message in FIFO order; `None` once every producer is gone.
    pub async fn recv(&mut self) -> Option<OfflineMessage> {
        let msg = match &mut self.rx {
            Rx::Bounded(rx) => rx.recv().await,
            Rx::Unbounded(rx) => rx.recv().await,
        };
        self.received(msg)
    }

    pub fn try_recv(&mut self) -> Option<OfflineMessage> {
        let msg = match &mut self.rx {
            Rx::Bounded(rx) => rx.try_recv().ok(),
            Rx::Unbounded(rx) => rx.try_recv().ok(),
        };
        self.received(msg)
    }

    fn received(&self, msg: Option<OfflineMessage>) -> Option<OfflineMessage> {
        if msg.is_some() {
            self.queued.fetch_sub(1, Ordering::Relaxed);
        }
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use relaygate_core::protocol::TransportMessage;

    fn msg(user: &str, n: u8) -> OfflineMessage {
        OfflineMessage::new(user, TransportMessage::ping(n))
    }

    #[tokio::test]
    async fn accumulates_until_consumer_attaches() {
        let p = OfflinePipeline::unbounded();
        for i in 0..5 {
            p.enqueue(msg("u", i)).await.unwrap();
        }
        assert_eq!(p.backlog(), 5);

        let mut c = p.attach().unwrap();
        for i in 0..5 {
            assert_eq!(c.recv().await.unwrap().message.client_type, i);
        }
        assert!(c.try_recv().is_none());
    }

    #[tokio::test]
    async fn second_attach_is_refused() {
        let p = OfflinePipeline::unbounded();
        let _c = p.attach().unwrap();
        assert!(matches!(p.attach(), Err(RelayError::ConsumerAttached)));
    }

    #[tokio::test]
    async fn reject_policy_reports_full() {
        let p = OfflinePipeline::bounded(2, OverflowPolicy::Reject);
        p.enqueue(msg("a", 0)).await.unwrap();
        p.enqueue(msg("b", 1)).await.unwrap();
        assert!(matches!(p.enqueue(msg("c", 2)).await, Err(RelayError::PipelineFull)));
        assert_eq!(p.backlog(), 2);
    }

    #[tokio::test]
    async fn block_policy_waits_for_room() {
        let p = OfflinePipeline::bounded(1, OverflowPolicy::Block);
        p.enqueue(msg("a", 0)).await.unwrap();

        let producer = p.clone();
        let pending = tokio::spawn(async move { producer.enqueue(msg("b", 1)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        let mut c = p.attach().unwrap();
        assert_eq!(c.recv().await.unwrap().user_id, "a");
        pending.await.unwrap().unwrap();
        assert_eq!(c.recv().await.unwrap().user_id, "b");
    }

    #[tokio::test]
    async fn dropped_consumer_closes_pipeline() {
        let p = OfflinePipeline::unbounded();
        drop(p.attach().unwrap());
        assert!(matches!(p.enqueue(msg("a", 0)).await, Err(RelayError::PipelineClosed)));
    }
}
