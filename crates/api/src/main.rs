use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use geofence_api::app::{create_app, AppState};
use geofence_api::config::Config;
use geofence_api::jobs::{
    ArchiveCleanupJob, DedupCleanupJob, EngineMetricsJob, JobScheduler, MembershipCleanupJob,
};
use geofence_api::middleware::{init_metrics, logging::init_logging, metrics::record_delivery_failure};
use geofence_api::services::build_dispatcher;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    init_logging(&config.logging)?;
    init_metrics()?;

    info!("Starting geofence engine v{}", env!("CARGO_PKG_VERSION"));

    let dispatcher = build_dispatcher(&config)?;
    let state = AppState::new(config.clone(), dispatcher);

    // Exhausted deliveries surface here
    if let Some(mut failures) = state.dispatcher.take_failures() {
        tokio::spawn(async move {
            while let Some(failure) = failures.recv().await {
                record_delivery_failure(failure.channel);
                error!(
                    event_id = %failure.event.event_id,
                    geofence_id = %failure.event.geofence_id,
                    device_id = %failure.event.device_id,
                    channel = %failure.channel,
                    target = %failure.target,
                    attempts = failure.attempts,
                    error = %failure.last_error,
                    "Alert delivery failed"
                );
            }
        });
    }

    let mut scheduler = JobScheduler::new();
    scheduler.register(MembershipCleanupJob::new(state.engine.clone()));
    scheduler.register(DedupCleanupJob::new(state.dispatcher.clone()));
    scheduler.register(EngineMetricsJob::new(
        state.engine.clone(),
        state.dispatcher.clone(),
    ));
    if let Some(archive) = &state.archive {
        scheduler.register(ArchiveCleanupJob::new(
            archive.clone(),
            config.archive.retention_days,
        ));
    }
    scheduler.start();

    let app = create_app(state.clone());

    let addr = config.socket_addr()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown_state = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_state.begin_shutdown();
        })
        .await?;

    let timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    scheduler.shutdown();
    if !state.dispatcher.shutdown(timeout).await {
        warn!(
            in_flight = state.dispatcher.in_flight(),
            "Alert deliveries still pending at shutdown"
        );
    }
    scheduler.wait_for_shutdown(timeout).await;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining");
}
