//! Server dependencies.
//!
//! The tracking registries are explicit service instances constructed once
//! at startup and passed by reference to every route; nothing here is an
//! ambient global, so tests can wire their own instances (with the queue
//! fake) in isolation.

use std::sync::Arc;

use super::scrape::SearchPageClient;
use super::tracking::{EventBus, JobTracker, QueueDispatcher};

/// Dependency container shared by all routes.
#[derive(Clone)]
pub struct ServerDeps {
    /// Single source of truth for "what is running now".
    pub tracker: Arc<JobTracker>,
    /// Pub/sub bus connecting job mutations to stream connections.
    pub bus: EventBus,
    /// Hand-off to the external tracking queue.
    pub dispatcher: Arc<QueueDispatcher>,
    /// Client for on-demand rank checks against the live results page.
    pub scraper: Arc<SearchPageClient>,
    /// Shared secret required on the worker callback route, if set.
    pub worker_token: Option<String>,
    /// SSE heartbeat interval in seconds.
    pub heartbeat_secs: u64,
}

impl ServerDeps {
    pub fn new(
        tracker: Arc<JobTracker>,
        bus: EventBus,
        dispatcher: Arc<QueueDispatcher>,
        scraper: Arc<SearchPageClient>,
        worker_token: Option<String>,
        heartbeat_secs: u64,
    ) -> Self {
        Self {
            tracker,
            bus,
            dispatcher,
            scraper,
            worker_token,
            heartbeat_secs,
        }
    }
}
