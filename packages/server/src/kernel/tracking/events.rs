//! Tracking lifecycle events.
//!
//! These are immutable facts broadcast on the [`EventBus`], not commands.
//! The closed set of variants keeps handler registration checked at compile
//! time instead of relying on stringly-typed event names.
//!
//! [`EventBus`]: super::bus::EventBus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::{JobStatus, Progress, TrackingJob};

/// An immutable fact about the tracking pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackingEvent {
    /// A job's status or progress changed.
    StatusUpdate {
        job_id: Uuid,
        status: JobStatus,
        progress: Progress,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Full job snapshot, for observers that render the whole row.
    JobUpdate { job: TrackingJob },

    /// Human-readable progress line for the dashboard activity log.
    LogUpdate { job_id: Uuid, line: String },
}

impl TrackingEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TrackingEvent::StatusUpdate { .. } => EventKind::StatusUpdate,
            TrackingEvent::JobUpdate { .. } => EventKind::JobUpdate,
            TrackingEvent::LogUpdate { .. } => EventKind::LogUpdate,
        }
    }

    /// Status event for a job, with an optional display message.
    pub fn status(job: &TrackingJob, message: Option<String>) -> Self {
        TrackingEvent::StatusUpdate {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            message,
        }
    }
}

/// Discriminant for handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StatusUpdate,
    JobUpdate,
    LogUpdate,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::StatusUpdate,
        EventKind::JobUpdate,
        EventKind::LogUpdate,
    ];

    /// Wire name, matching the serde tag on [`TrackingEvent`].
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::StatusUpdate => "status_update",
            EventKind::JobUpdate => "job_update",
            EventKind::LogUpdate => "log_update",
        }
    }
}

/// A published event plus its publish time, as retained by the replay buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusRecord {
    pub event: TrackingEvent,
    pub timestamp: DateTime<Utc>,
}

impl BusRecord {
    pub fn new(event: TrackingEvent) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
        }
    }

    /// Flatten to the push-channel frame shape: `{type, timestamp, ...payload}`.
    pub fn to_frame(&self) -> serde_json::Value {
        let mut frame = serde_json::to_value(&self.event)
            .unwrap_or_else(|_| serde_json::json!({ "type": self.event.kind().as_str() }));
        if let Some(map) = frame.as_object_mut() {
            map.insert(
                "timestamp".to_string(),
                serde_json::Value::String(self.timestamp.to_rfc3339()),
            );
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_snake_case_tag() {
        let event = TrackingEvent::LogUpdate {
            job_id: Uuid::new_v4(),
            line: "checked 3/20 keywords".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "log_update");
        assert_eq!(json["line"], "checked 3/20 keywords");
    }

    #[test]
    fn kind_matches_serde_tag() {
        let event = TrackingEvent::StatusUpdate {
            job_id: Uuid::new_v4(),
            status: JobStatus::Running,
            progress: Progress::default(),
            message: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.kind().as_str());
    }

    #[test]
    fn frame_carries_type_and_timestamp() {
        let record = BusRecord::new(TrackingEvent::LogUpdate {
            job_id: Uuid::new_v4(),
            line: "hello".to_string(),
        });
        let frame = record.to_frame();
        assert_eq!(frame["type"], "log_update");
        assert!(frame["timestamp"].is_string());
    }
}
