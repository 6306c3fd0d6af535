use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// NATS endpoint for the external tracking queue. Tracking dispatch is
    /// refused (503) when this is unset - the server still serves status
    /// queries and streams.
    pub nats_url: Option<String>,
    /// Subject prefix for queue messages (e.g. "tracking" -> "tracking.blog").
    pub queue_subject_prefix: String,
    /// Shared secret workers present on the progress callback route.
    pub worker_token: Option<String>,
    /// Search-results page fetched for on-demand rank checks.
    pub search_url: String,
    /// Ring-buffer capacity for event replay to late-connecting dashboards.
    pub event_buffer_capacity: usize,
    /// SSE heartbeat interval in seconds.
    pub heartbeat_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            nats_url: env::var("NATS_URL").ok(),
            queue_subject_prefix: env::var("QUEUE_SUBJECT_PREFIX")
                .unwrap_or_else(|_| "tracking".to_string()),
            worker_token: env::var("WORKER_TOKEN").ok(),
            search_url: env::var("SEARCH_URL")
                .unwrap_or_else(|_| "https://m.search.naver.com/search.naver".to_string()),
            event_buffer_capacity: env::var("EVENT_BUFFER_CAPACITY")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("EVENT_BUFFER_CAPACITY must be a valid number")?,
            heartbeat_secs: env::var("HEARTBEAT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("HEARTBEAT_SECS must be a valid number")?,
        })
    }
}
