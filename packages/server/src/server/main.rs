// Main entry point for the rank-tracking API server

use std::sync::Arc;

use anyhow::{Context, Result};
use server_core::kernel::tracking::{
    EventBus, JobTracker, NatsQueue, QueueDispatcher, QueuePublisher,
};
use server_core::kernel::{SearchPageClient, ServerDeps};
use server_core::server::build_app;
use server_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Placerank tracking API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to the external tracking queue, if configured. Without it the
    // server still serves status queries and streams; dispatch returns 503.
    let queue: Option<Arc<dyn QueuePublisher>> = match &config.nats_url {
        Some(url) => {
            tracing::info!("Connecting to tracking queue...");
            let client = async_nats::connect(url)
                .await
                .context("Failed to connect to NATS")?;
            tracing::info!("Tracking queue connected");
            Some(Arc::new(NatsQueue::new(
                client,
                config.queue_subject_prefix.clone(),
            )))
        }
        None => {
            tracing::warn!("NATS_URL not set - tracking dispatch disabled");
            None
        }
    };

    let scraper = Arc::new(
        SearchPageClient::new(config.search_url.clone())
            .context("Failed to create search page client")?,
    );

    let deps = Arc::new(ServerDeps::new(
        Arc::new(JobTracker::new()),
        EventBus::with_capacity(config.event_buffer_capacity),
        Arc::new(QueueDispatcher::new(queue)),
        scraper,
        config.worker_token.clone(),
        config.heartbeat_secs,
    ));

    let app = build_app(deps);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Tracking stream: http://localhost:{}/api/tracking/stream", config.port);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
