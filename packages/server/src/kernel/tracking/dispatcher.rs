//! Batch dispatch of keyword work to the external tracking queue.
//!
//! The dispatcher partitions a caller's backlog into chunks of at most 10
//! messages (the queue's own batch-size ceiling) and sends each chunk as one
//! batched publish. Chunks are not transactional: a failed chunk never rolls
//! back chunks already sent, and retries are the queue's responsibility.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

use super::job::JobKind;

/// Queue batch-size ceiling, mirroring the external queue's limit.
pub const BATCH_SIZE: usize = 10;

/// Tuned planning constants: observed seconds per keyword scrape and worker
/// parallelism on the queue side.
const SECONDS_PER_ITEM: u64 = 9;
const CONCURRENT_WORKERS: u64 = 10;

/// One queue entry, as serialized onto the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TrackingMessage {
    #[serde(rename = "BLOG_TRACKING", rename_all = "camelCase")]
    Blog {
        keyword_id: Uuid,
        keyword: String,
        user_id: Uuid,
        blog_url: String,
        blog_name: String,
        project_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "SMARTPLACE_TRACKING", rename_all = "camelCase")]
    Smartplace {
        keyword_id: Uuid,
        keyword: String,
        user_id: Uuid,
        place_id: String,
        place_name: String,
        timestamp: DateTime<Utc>,
    },
}

impl TrackingMessage {
    pub fn kind(&self) -> JobKind {
        match self {
            TrackingMessage::Blog { .. } => JobKind::Blog,
            TrackingMessage::Smartplace { .. } => JobKind::Smartplace,
        }
    }
}

/// Transport for batched queue sends.
///
/// Production uses NATS; tests use the recording fake in
/// [`testing`](super::testing).
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    /// Send one batch (at most [`BATCH_SIZE`] messages) to the queue.
    async fn send_batch(&self, messages: &[TrackingMessage]) -> Result<()>;
}

/// NATS-backed queue publisher. Messages land on
/// `{prefix}.{kind}` subjects (e.g. `tracking.blog`) as JSON bodies.
pub struct NatsQueue {
    client: async_nats::Client,
    subject_prefix: String,
}

impl NatsQueue {
    pub fn new(client: async_nats::Client, subject_prefix: String) -> Self {
        Self {
            client,
            subject_prefix,
        }
    }
}

#[async_trait]
impl QueuePublisher for NatsQueue {
    async fn send_batch(&self, messages: &[TrackingMessage]) -> Result<()> {
        for message in messages {
            let subject = format!("{}.{}", self.subject_prefix, message.kind().as_str());
            let payload = serde_json::to_vec(message)?;
            self.client
                .publish(subject, bytes::Bytes::from(payload))
                .await?;
        }
        // One flush per chunk: the whole batch reaches the server together.
        self.client.flush().await?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Queue endpoint or credentials missing. Callers surface this as a
    /// user-facing "not configured" condition instead of degrading silently.
    #[error("tracking queue is not configured")]
    NotConfigured,
}

/// A chunk that failed to send. Items already sent in earlier chunks stay
/// sent (at-least-once, non-transactional).
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub batch_index: usize,
    pub size: usize,
    pub message: String,
}

/// Typed outcome of a dispatch call, replacing log inspection as the only
/// feedback channel.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub requested: usize,
    pub sent: usize,
    pub batches: usize,
    pub failures: Vec<BatchFailure>,
}

impl DispatchReport {
    pub fn all_sent(&self) -> bool {
        self.failures.is_empty() && self.sent == self.requested
    }
}

/// Hands batches of keyword work to the external queue.
pub struct QueueDispatcher {
    queue: Option<Arc<dyn QueuePublisher>>,
}

impl QueueDispatcher {
    pub fn new(queue: Option<Arc<dyn QueuePublisher>>) -> Self {
        Self { queue }
    }

    /// True iff a queue transport is configured. Callers must check this
    /// before dispatching.
    pub fn is_available(&self) -> bool {
        self.queue.is_some()
    }

    /// Planning estimate shown to users, not a guarantee:
    /// `ceil(items * seconds_per_item / concurrent_workers)`.
    pub fn estimate_seconds(&self, item_count: usize) -> u64 {
        (item_count as u64 * SECONDS_PER_ITEM).div_ceil(CONCURRENT_WORKERS)
    }

    /// Send the backlog in chunks of at most [`BATCH_SIZE`].
    ///
    /// Chunks are sent sequentially; a failed chunk is recorded in the
    /// report and the remaining chunks are still attempted. `Err` is
    /// reserved for the not-configured case.
    pub async fn dispatch(
        &self,
        messages: &[TrackingMessage],
    ) -> Result<DispatchReport, DispatchError> {
        let queue = self.queue.as_ref().ok_or(DispatchError::NotConfigured)?;

        let mut report = DispatchReport {
            requested: messages.len(),
            ..Default::default()
        };

        for (batch_index, chunk) in messages.chunks(BATCH_SIZE).enumerate() {
            report.batches += 1;
            match queue.send_batch(chunk).await {
                Ok(()) => {
                    debug!(batch_index, size = chunk.len(), "tracking batch sent");
                    report.sent += chunk.len();
                }
                Err(e) => {
                    error!(batch_index, size = chunk.len(), error = %e, "tracking batch failed");
                    report.failures.push(BatchFailure {
                        batch_index,
                        size: chunk.len(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }
}
