use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::task::JoinHandle;

use relaygate_core::error::Result;
use relaygate_core::protocol::{encode_to_bytes, OfflineMessage};

use crate::offline::OfflineConsumer;

/// Persisted form of an offline message: the recipient and the message in
/// wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineRecord {
    pub user_id: String,
    pub frame: Bytes,
}

impl OfflineRecord {
    pub fn from_message(msg: &OfflineMessage) -> Result<Self> {
        Ok(Self {
            user_id: msg.user_id.clone(),
            frame: encode_to_bytes(&msg.message)?,
        })
    }
}

/// Durable side of the offline pipeline.
#[async_trait]
pub trait OfflineStore: Send + Sync {
    async fn persist(&self, record: OfflineRecord) -> Result<()>;
}

/// Process-local store keyed by recipient, oldest first.
#[derive(Default)]
pub struct MemoryOfflineStore {
    records: DashMap<String, Vec<Bytes>>,
}

impl MemoryOfflineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self, user: &str) -> Vec<Bytes> {
        self.records.get(user).map(|r| r.value().clone()).unwrap_or_default()
    }

    /// Remove and return everything stored for `user`.
    pub fn take(&self, user: &str) -> Vec<Bytes> {
        self.records.remove(user).map(|(_, v)| v).unwrap_or_default()
    }

    pub fn total(&self) -> usize {
        self.records.iter().map(|r| r.value().len()).sum()
    }
}

#[async_trait]
impl OfflineStore for MemoryOfflineStore {
    async fn persist(&self, record: OfflineRecord) -> Result<()> {
        self.records.entry(record.user_id).or_default().push(record.frame);
        Ok(())
    }
}

/// Drain `consumer` into `store` until the pipeline closes.
pub fn spawn_drain(mut consumer: OfflineConsumer, store: Arc<dyn OfflineStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = consumer.recv().await {
            let record = match OfflineRecord::from_message(&msg) {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(user = %msg.user_id, error = %e, "offline message not encodable, dropped");
                    continue;
                }
            };
            if let Err(e) = store.persist(record).await {
                tracing::error!(user = %msg.user_id, error = %e, "offline persist failed");
            }
        }
        tracing::debug!("offline pipeline closed, drain finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaygate_core::protocol::{FrameDecoder, MessageBody, ProtocolCategory, TransportMessage};

    use crate::offline::OfflinePipeline;

    #[tokio::test]
    async fn drain_persists_wire_frames_in_order() {
        let pipeline = OfflinePipeline::unbounded();
        let store = Arc::new(MemoryOfflineStore::new());

        for id in 1..=3u64 {
            let msg = TransportMessage::body(
                ProtocolCategory::One,
                0,
                MessageBody {
                    message_id: id,
                    ..MessageBody::topic("u1", "u2")
                },
            );
            pipeline.enqueue(OfflineMessage::new("u2", msg)).await.unwrap();
        }

        let consumer = pipeline.attach().unwrap();
        let handle = spawn_drain(consumer, store.clone());
        drop(pipeline);
        handle.await.unwrap();

        let frames = store.take("u2");
        assert_eq!(frames.len(), 3);
        let mut dec = FrameDecoder::default();
        let ids: Vec<u64> = frames
            .iter()
            .flat_map(|f| dec.feed(f).collect::<Vec<_>>())
            .map(|m| m.unwrap().as_body().unwrap().message_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(store.total(), 0);
    }
}
