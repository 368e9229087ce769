use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    clients::{health::HealthChecker, kafka::KafkaBrokerCheck},
    config::Config,
    models::health::HealthStatus,
    pool::PoolMonitor,
};

pub struct AppState {
    health_checker: HealthChecker,
}

pub fn router(config: &Config, monitor: PoolMonitor) -> Router {
    let state = Arc::new(AppState {
        health_checker: HealthChecker::new(
            Arc::new(KafkaBrokerCheck::new(config)),
            monitor,
            config.health_cache_ttl(),
        ),
    });

    Router::new()
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_api_server(config: Config, monitor: PoolMonitor) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", config.server_port);
    let app = router(&config, monitor);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "Health check server started");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_checker.check_all().await;

    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}
