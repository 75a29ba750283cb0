//! Completion notices for the delivery collaborator.

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use vox_models::CompletionNotice;

use crate::error::QueueResult;

/// Sink for completion notices.
///
/// Publishing is fire-and-forget from the worker's point of view: the
/// derived blob is already durably stored and the job acked by the time a
/// notice goes out, so a failed publish is logged, never retried.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn publish(&self, notice: &CompletionNotice) -> QueueResult<()>;
}

/// Completion notices over Redis Pub/Sub.
pub struct CompletionChannel {
    client: redis::Client,
    channel: String,
}

impl CompletionChannel {
    /// Create a new completion channel.
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            channel: "vox:completions".to_string(),
        })
    }

    /// Subscribe to completion notices.
    /// Returns a pinned stream that can be polled with `.next()`.
    pub async fn subscribe(
        &self,
    ) -> QueueResult<std::pin::Pin<Box<dyn futures_util::Stream<Item = CompletionNotice> + Send>>>
    {
        use futures_util::StreamExt;

        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str(&payload).ok()
        });

        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl CompletionSink for CompletionChannel {
    async fn publish(&self, notice: &CompletionNotice) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(notice)?;

        debug!(derived = %notice.derived_blob_id, "publishing completion notice");
        conn.publish::<_, _, ()>(&self.channel, payload).await?;

        Ok(())
    }
}

/// Process-local completion channel for tests and local development.
pub struct MemoryCompletionChannel {
    tx: tokio::sync::broadcast::Sender<CompletionNotice>,
}

impl MemoryCompletionChannel {
    pub fn new() -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<CompletionNotice> {
        self.tx.subscribe()
    }
}

impl Default for MemoryCompletionChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionSink for MemoryCompletionChannel {
    async fn publish(&self, notice: &CompletionNotice) -> QueueResult<()> {
        // No subscribers is fine; delivery is someone else's concern.
        let _ = self.tx.send(notice.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use vox_models::BlobId;

    use super::*;

    #[tokio::test]
    async fn memory_channel_delivers_notices() {
        let channel = MemoryCompletionChannel::new();
        let mut rx = channel.subscribe();

        let notice = CompletionNotice {
            derived_blob_id: BlobId::from_string("audio-1"),
            original_blob_id: BlobId::from_string("video-1"),
            requester_contact: "u1@example.com".to_string(),
        };
        channel.publish(&notice).await.expect("publish");

        let received = rx.recv().await.expect("recv");
        assert_eq!(received, notice);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_ok() {
        let channel = MemoryCompletionChannel::new();
        let notice = CompletionNotice {
            derived_blob_id: BlobId::from_string("audio-1"),
            original_blob_id: BlobId::from_string("video-1"),
            requester_contact: "u1@example.com".to_string(),
        };
        channel.publish(&notice).await.expect("publish");
    }
}
