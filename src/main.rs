//! Taskpulse notification service.
//!
//! Main entry point for the taskpulse server. Wires the notification
//! pipeline to its collaborators and coordinates graceful startup and
//! shutdown.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use taskpulse_api::{shutdown_signal, start_server, AppState, Config, WebhookSettings};
use taskpulse_core::{Clock, RealClock};
use taskpulse_pipeline::{
    Classifier, FanOut, GithubTracker, InMemoryDirectory, MessageLimits, NotificationPipeline,
    NotificationService, RecipientResolver, TelegramGateway, DEFAULT_HTTP_TIMEOUT,
};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// Time allowed for in-flight work after the server stops accepting requests.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    // Initialize tracing with structured logging
    init_tracing(&config.rust_log)?;

    info!("Starting taskpulse notification service");
    info!(config = ?config, "Configuration loaded");

    let addr = config.parse_server_addr()?;
    let state = build_state(&config).await?;

    // Start HTTP server
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let mut server_handle = tokio::spawn({
        let request_timeout = config.request_timeout();
        async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = start_server(state, addr, request_timeout, shutdown).await {
                error!(error = %e, "Server failed");
            }
        }
    });

    info!(addr = %addr, "taskpulse is ready to receive webhooks");

    tokio::select! {
        () = shutdown_signal() => {
            info!("Shutdown signal received, starting graceful shutdown");
        },
        _ = &mut server_handle => {
            warn!("Server exited before a shutdown signal was received");
            return Ok(());
        },
    }

    let _ = shutdown_tx.send(());

    // Give in-flight requests time to complete
    tokio::select! {
        () = tokio::time::sleep(SHUTDOWN_GRACE_PERIOD) => {
            info!("Shutdown grace period expired");
        },
        _ = server_handle => {
            info!("Server stopped");
        },
    }

    info!("taskpulse shutdown complete");
    Ok(())
}

/// Builds the notification service and request state from configuration.
async fn build_state(config: &Config) -> Result<AppState> {
    let clock: Arc<dyn Clock> = Arc::new(RealClock::new());

    let gateway = TelegramGateway::new(
        &config.telegram_api_url,
        &config.telegram_bot_token,
        DEFAULT_HTTP_TIMEOUT,
    )
    .context("Failed to create messaging gateway")?;
    let tracker = GithubTracker::new(&config.github_graphql_url, DEFAULT_HTTP_TIMEOUT)
        .context("Failed to create task tracker client")?;

    let directory = match &config.subscribers_file {
        Some(path) => InMemoryDirectory::load(path)
            .await
            .with_context(|| format!("Failed to load subscribers from {}", path.display()))?,
        None => InMemoryDirectory::new(),
    };
    let subscriber_count = directory.len().await;
    if subscriber_count == 0 {
        warn!("Subscriber directory is empty; no notifications will be delivered");
    } else {
        info!(subscribers = subscriber_count, "Subscriber directory loaded");
    }

    let pipeline = NotificationPipeline::new(
        Classifier::new(Arc::new(tracker), config.github_token.clone()),
        config.formatter()?,
        RecipientResolver::new(Arc::new(directory)),
        FanOut::new(Arc::new(gateway), MessageLimits::default()),
    );
    let service = NotificationService::new(pipeline, Arc::clone(&clock), config.service_settings());

    let webhook = WebhookSettings {
        event_header: config.event_header_name()?,
        secret: config.webhook_secret().map(String::from),
    };

    Ok(AppState::new(Arc::new(service), webhook, clock))
}

/// Initializes tracing, preferring `RUST_LOG` over the configured filter.
fn init_tracing(default_filter: &str) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .context("Invalid log filter")?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
    Ok(())
}
