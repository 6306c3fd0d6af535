//! Test doubles for the tracking pipeline.

use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::dispatcher::{QueuePublisher, TrackingMessage};

/// Queue publisher that records batches in memory for inspection.
///
/// Individual batch indices can be made to fail to exercise the
/// non-transactional chunk semantics.
#[derive(Default)]
pub struct RecordingQueue {
    batches: Mutex<Vec<Vec<TrackingMessage>>>,
    fail_indices: Mutex<HashSet<usize>>,
    calls: Mutex<usize>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `index`-th `send_batch` call fail.
    pub fn fail_batch(&self, index: usize) {
        self.fail_indices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(index);
    }

    /// Successfully sent batches, in send order.
    pub fn batches(&self) -> Vec<Vec<TrackingMessage>> {
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Total `send_batch` calls, including failed ones.
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl QueuePublisher for RecordingQueue {
    async fn send_batch(&self, messages: &[TrackingMessage]) -> Result<()> {
        let call = {
            let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
            let call = *calls;
            *calls += 1;
            call
        };

        if self
            .fail_indices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&call)
        {
            return Err(anyhow!("simulated queue failure on batch {}", call));
        }

        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());
        Ok(())
    }
}
