//! Keyword rank-tracking pipeline.
//!
//! - [`extract`] - rank computation over a rendered results page
//! - [`JobTracker`] - in-process registry of aggregate tracking jobs
//! - [`EventBus`] - typed pub/sub with a bounded replay buffer
//! - [`QueueDispatcher`] - batched hand-off to the external queue
//!
//! The SSE gateway that fans events out to dashboards lives in
//! `server::routes::stream`.

pub mod bus;
pub mod dispatcher;
pub mod events;
pub mod extractor;
pub mod testing;
mod job;
mod tracker;

pub use bus::{BusSubscription, EventBus, EventHandler, HandlerId};
pub use dispatcher::{
    BatchFailure, DispatchError, DispatchReport, NatsQueue, QueueDispatcher, QueuePublisher,
    TrackingMessage, BATCH_SIZE,
};
pub use events::{BusRecord, EventKind, TrackingEvent};
pub use extractor::{extract, normalize_name, RankSnapshot, ResultItem, Target, TopEntry};
pub use job::{JobFailure, JobKind, JobPatch, JobStatus, NewJob, Progress, TrackingJob};
pub use tracker::{JobTracker, TrackerError};
