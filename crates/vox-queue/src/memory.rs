//! In-memory job broker.
//!
//! Implements the same lease discipline as the Redis backend inside one
//! process: a delivered job stays invisible to other consumers until its
//! lease lapses, then goes back to the front of the queue. Used by tests
//! and local development.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, warn};

use vox_models::TranscodeJob;

use crate::error::{QueueError, QueueResult};
use crate::queue::{Delivery, DeliveryTag, JobQueue};

// How long a blocked receiver waits before re-checking lapsed leases.
const POLL_SLICE: Duration = Duration::from_millis(25);

struct Lease {
    job: TranscodeJob,
    expires_at: Instant,
}

#[derive(Default)]
struct BrokerState {
    next_tag: u64,
    closed: bool,
    ready: VecDeque<TranscodeJob>,
    in_flight: HashMap<DeliveryTag, Lease>,
}

/// Process-local broker with lease-based redelivery.
pub struct MemoryJobQueue {
    state: Mutex<BrokerState>,
    notify: Notify,
    lease: Duration,
}

impl MemoryJobQueue {
    /// Create a broker whose deliveries are redelivered after `lease`
    /// without an ack.
    pub fn new(lease: Duration) -> Self {
        Self {
            state: Mutex::new(BrokerState::default()),
            notify: Notify::new(),
            lease,
        }
    }

    /// Refuse all further enqueues and wake blocked receivers.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    /// Jobs waiting for delivery (leased jobs not included).
    pub async fn depth(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    /// Jobs delivered but not yet acknowledged.
    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    fn requeue_lapsed(state: &mut BrokerState, now: Instant) {
        let lapsed: Vec<DeliveryTag> = state
            .in_flight
            .iter()
            .filter(|(_, lease)| lease.expires_at <= now)
            .map(|(tag, _)| tag.clone())
            .collect();

        for tag in lapsed {
            if let Some(lease) = state.in_flight.remove(&tag) {
                warn!(job_id = %lease.job.job_id, "lease lapsed, requeueing for redelivery");
                state.ready.push_front(lease.job);
            }
        }
    }
}

impl Default for MemoryJobQueue {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: &TranscodeJob) -> QueueResult<DeliveryTag> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(QueueError::unavailable("broker closed"));
        }

        state.next_tag += 1;
        let tag = DeliveryTag(state.next_tag.to_string());
        state.ready.push_back(job.clone());
        drop(state);

        self.notify.notify_one();
        debug!(job_id = %job.job_id, %tag, "enqueued job");
        Ok(tag)
    }

    async fn receive(&self, consumer: &str, timeout: Duration) -> QueueResult<Option<Delivery>> {
        let deadline = Instant::now() + timeout;

        loop {
            {
                let mut state = self.state.lock().await;
                if state.closed {
                    return Err(QueueError::Closed);
                }

                let now = Instant::now();
                Self::requeue_lapsed(&mut state, now);

                if let Some(job) = state.ready.pop_front() {
                    state.next_tag += 1;
                    let tag = DeliveryTag(state.next_tag.to_string());
                    state.in_flight.insert(
                        tag.clone(),
                        Lease {
                            job: job.clone(),
                            expires_at: now + self.lease,
                        },
                    );
                    debug!(consumer, job_id = %job.job_id, %tag, "delivered job");
                    return Ok(Some(Delivery { tag, job }));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            // Bounded wait so lapsed leases are noticed even without a
            // fresh enqueue.
            let wait = POLL_SLICE.min(deadline - now);
            let _ = tokio::time::timeout(wait, self.notify.notified()).await;
        }
    }

    async fn ack(&self, tag: &DeliveryTag) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        state
            .in_flight
            .remove(tag)
            .map(|_| ())
            .ok_or_else(|| QueueError::UnknownDelivery(tag.to_string()))
    }
}
