//! Durable transcode job queue.
//!
//! This crate provides:
//! - The [`JobQueue`] trait: durable enqueue, leased receive, explicit ack
//! - A Redis Streams backend (consumer groups, pending-claim redelivery)
//! - An in-memory broker for tests and local development
//! - Completion notices over Redis Pub/Sub

pub mod error;
pub mod memory;
pub mod notice;
pub mod queue;
pub mod redis_queue;

pub use error::{QueueError, QueueResult};
pub use memory::MemoryJobQueue;
pub use notice::{CompletionChannel, CompletionSink, MemoryCompletionChannel};
pub use queue::{Delivery, DeliveryTag, JobQueue};
pub use redis_queue::{RedisJobQueue, RedisQueueConfig};
