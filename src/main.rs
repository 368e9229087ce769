use std::sync::Arc;

use anyhow::{Error, Result};
use notification_orchestrator::{
    api::run_api_server,
    broker::Publisher,
    clients::kafka::{KafkaConnector, KafkaPublisher, check_connectivity},
    config::Config,
    handlers::register_all,
    pool::ConsumerPool,
    processor::EventProcessor,
    registry::EventRegistry,
    service::NotificationService,
};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Loaded first so a RUST_LOG set in .env reaches the filter.
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_new(&config.rust_log).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = check_connectivity(&config.kafka_brokers, config.broker_check_timeout()).await {
        error!(error = %e, "Kafka not available, refusing to start");
        return Err(e.into());
    }

    let publisher = Arc::new(KafkaPublisher::connect(&config)?);
    let service = Arc::new(NotificationService::new(publisher.clone()));

    let mut registry = EventRegistry::new();
    register_all(&mut registry, service)?;
    let processor = Arc::new(EventProcessor::new(Arc::new(registry)));

    let connector = KafkaConnector::new(&config)?;
    let mut pool = ConsumerPool::new(connector, processor, config.shutdown_grace());
    pool.start(config.worker_concurrency)?;

    let api_config = config.clone();
    let monitor = pool.monitor();
    let api = tokio::spawn(async move {
        if let Err(e) = run_api_server(api_config, monitor).await {
            error!(error = %e, "Health check server stopped");
        }
    });

    shutdown_signal().await;
    info!("Shutdown requested");

    // Consumer before producer, so nothing is still publishing when the producer goes away.
    match pool.close().await {
        Ok(outcome) => info!(?outcome, "Consumer pool released"),
        Err(e) => error!(error = %e, "Consumer pool closed with errors"),
    }

    if let Err(e) = publisher.close().await {
        error!(error = %e, "Error closing producer");
    }

    api.abort();
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
