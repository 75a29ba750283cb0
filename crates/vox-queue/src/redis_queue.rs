//! Redis Streams job queue backend.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamClaimReply, StreamId, StreamPendingCountReply, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use vox_models::TranscodeJob;

use crate::error::{QueueError, QueueResult};
use crate::queue::{Delivery, DeliveryTag, JobQueue};

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct RedisQueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// How long a delivery may stay unacknowledged before another consumer
    /// can claim it (crash redelivery).
    pub visibility_timeout: Duration,
}

impl Default for RedisQueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "vox:jobs".to_string(),
            consumer_group: "vox:transcoders".to_string(),
            visibility_timeout: Duration::from_secs(300),
        }
    }
}

impl RedisQueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            stream_name: std::env::var("VOX_QUEUE_STREAM")
                .unwrap_or_else(|_| "vox:jobs".to_string()),
            consumer_group: std::env::var("VOX_QUEUE_GROUP")
                .unwrap_or_else(|_| "vox:transcoders".to_string()),
            visibility_timeout: Duration::from_secs(
                std::env::var("VOX_QUEUE_VISIBILITY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
        }
    }
}

/// Job queue on a durable Redis stream.
pub struct RedisJobQueue {
    client: redis::Client,
    config: RedisQueueConfig,
}

impl RedisJobQueue {
    /// Create a new job queue.
    pub fn new(config: RedisQueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(RedisQueueConfig::from_env())
    }

    /// Initialize the queue (create stream + consumer group if missing).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Number of entries in the stream, delivered-but-unacked included.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }

    async fn connection(&self) -> QueueResult<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    fn parse_entry(&self, entry: &StreamId) -> Option<TranscodeJob> {
        let payload = match entry.map.get("job") {
            Some(redis::Value::BulkString(payload)) => String::from_utf8_lossy(payload).into_owned(),
            _ => return None,
        };
        serde_json::from_str(&payload).ok()
    }

    /// Claim one delivery whose lease lapsed (unacked past the visibility
    /// timeout), taking it over for `consumer`.
    async fn claim_stale(
        &self,
        conn: &mut MultiplexedConnection,
        consumer: &str,
    ) -> QueueResult<Option<Delivery>> {
        let min_idle_ms = self.config.visibility_timeout.as_millis() as u64;

        let pending: StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("IDLE")
            .arg(min_idle_ms)
            .arg("-")
            .arg("+")
            .arg(1)
            .query_async(conn)
            .await?;

        let Some(stale) = pending.ids.first() else {
            return Ok(None);
        };

        let claimed: StreamClaimReply = redis::cmd("XCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer)
            .arg(min_idle_ms)
            .arg(&stale.id)
            .query_async(conn)
            .await?;

        for entry in &claimed.ids {
            let tag = DeliveryTag(entry.id.clone());
            match self.parse_entry(entry) {
                Some(job) => {
                    warn!(job_id = %job.job_id, %tag, "claimed stale delivery for redelivery");
                    return Ok(Some(Delivery { tag, job }));
                }
                None => {
                    warn!(%tag, "acking malformed stale payload");
                    self.ack(&tag).await?;
                }
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: &TranscodeJob) -> QueueResult<DeliveryTag> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::unavailable(e.to_string()))?;

        let payload = serde_json::to_string(job)?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::unavailable(e.to_string()))?;

        info!(job_id = %job.job_id, %message_id, "enqueued job");
        Ok(DeliveryTag(message_id))
    }

    async fn receive(&self, consumer: &str, timeout: Duration) -> QueueResult<Option<Delivery>> {
        let mut conn = self.connection().await?;

        // Crash recovery first: deliveries whose lease lapsed take priority
        // over new entries.
        if let Some(delivery) = self.claim_stale(&mut conn, consumer).await? {
            return Ok(Some(delivery));
        }

        let block_ms = timeout.as_millis().max(1) as u64;
        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer)
            .arg("COUNT")
            .arg(1)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let Some(reply) = reply else {
            return Ok(None);
        };

        for stream_key in reply.keys {
            for entry in stream_key.ids {
                let tag = DeliveryTag(entry.id.clone());
                match self.parse_entry(&entry) {
                    Some(job) => {
                        debug!(consumer, job_id = %job.job_id, %tag, "delivered job");
                        return Ok(Some(Delivery { tag, job }));
                    }
                    None => {
                        // Poison message: redelivering it would loop forever.
                        warn!(%tag, "acking malformed payload");
                        self.ack(&tag).await?;
                    }
                }
            }
        }

        Ok(None)
    }

    async fn ack(&self, tag: &DeliveryTag) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(tag.as_str())
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(tag.as_str())
            .query_async::<()>(&mut conn)
            .await?;

        debug!(%tag, "acknowledged job");
        Ok(())
    }
}
