use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    error::BrokerError,
    models::{
        health::{HealthCheckResponse, HealthStatus, ServiceHealth},
        pool::{PoolState, WorkerCount},
    },
    pool::PoolMonitor,
};

/// Answers whether the message broker is reachable.
#[async_trait]
pub trait BrokerCheck: Send + Sync {
    /// Returns the number of brokers that answered.
    async fn check(&self) -> Result<usize, BrokerError>;
}

pub struct HealthChecker {
    broker_check: Arc<dyn BrokerCheck>,
    monitor: PoolMonitor,
    cache_ttl: Duration,
    last_broker_check: Mutex<Option<(Instant, ServiceHealth)>>,
}

impl HealthChecker {
    pub fn new(
        broker_check: Arc<dyn BrokerCheck>,
        monitor: PoolMonitor,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            broker_check,
            monitor,
            cache_ttl,
            last_broker_check: Mutex::new(None),
        }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        let broker_health = self.check_broker().await;
        checks.insert("message_broker".to_string(), broker_health);

        let pool_state = self.monitor.state();
        let workers = self.monitor.workers();

        if pool_state == PoolState::Running && workers.has_dead_workers() {
            warn!(
                started = workers.started,
                live = workers.live,
                "Consumer pool is running with dead workers"
            );
        }

        let overall_status = determine_overall_status(pool_state, workers, &checks);

        HealthCheckResponse {
            status: overall_status,
            timestamp: Utc::now(),
            pool_state,
            workers,
            checks,
        }
    }

    /// Reuses the last result while it is younger than the cache TTL.
    /// Concurrent requests wait for a single in-progress check.
    async fn check_broker(&self) -> ServiceHealth {
        let mut last = self.last_broker_check.lock().await;

        if let Some((checked_at, health)) = last.as_ref() {
            if checked_at.elapsed() < self.cache_ttl {
                return health.clone();
            }
        }

        let health = self.run_broker_check().await;
        *last = Some((Instant::now(), health.clone()));

        health
    }

    async fn run_broker_check(&self) -> ServiceHealth {
        let start = Instant::now();

        match self.broker_check.check().await {
            Ok(broker_count) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, broker_count, "Kafka health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "Kafka health check failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }
}

fn determine_overall_status(
    pool_state: PoolState,
    workers: WorkerCount,
    checks: &HashMap<String, ServiceHealth>,
) -> HealthStatus {
    let has_unhealthy = checks
        .values()
        .any(|health| health.status == HealthStatus::Unhealthy);

    match pool_state {
        _ if has_unhealthy => HealthStatus::Unhealthy,
        PoolState::Running if workers.live == 0 => HealthStatus::Unhealthy,
        PoolState::Running if workers.has_dead_workers() => HealthStatus::Degraded,
        PoolState::Running => HealthStatus::Healthy,
        PoolState::Idle | PoolState::ShuttingDown | PoolState::Drained => HealthStatus::Degraded,
        PoolState::Closed => HealthStatus::Unhealthy,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::watch;

    use super::*;

    fn broker(status: ServiceHealth) -> HashMap<String, ServiceHealth> {
        HashMap::from([("message_broker".to_string(), status)])
    }

    fn all_live(n: usize) -> WorkerCount {
        WorkerCount {
            started: n,
            live: n,
        }
    }

    struct CountingCheck {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BrokerCheck for CountingCheck {
        async fn check(&self) -> Result<usize, BrokerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        }
    }

    fn checker(cache_ttl: Duration) -> (HealthChecker, Arc<CountingCheck>) {
        let broker_check = Arc::new(CountingCheck {
            calls: AtomicUsize::new(0),
        });
        let (_, state) = watch::channel(PoolState::Running);
        let (_, workers) = watch::channel(all_live(2));

        let checker = HealthChecker::new(
            broker_check.clone(),
            PoolMonitor::new(state, workers),
            cache_ttl,
        );

        (checker, broker_check)
    }

    #[test]
    fn running_with_reachable_broker_is_healthy() {
        let checks = broker(ServiceHealth::healthy(3));

        assert_eq!(
            determine_overall_status(PoolState::Running, all_live(4), &checks),
            HealthStatus::Healthy
        );
    }

    #[test]
    fn shutting_down_is_degraded() {
        let checks = broker(ServiceHealth::healthy(3));

        assert_eq!(
            determine_overall_status(PoolState::ShuttingDown, all_live(4), &checks),
            HealthStatus::Degraded
        );
    }

    #[test]
    fn dead_workers_degrade_a_running_pool() {
        let checks = broker(ServiceHealth::healthy(3));

        assert_eq!(
            determine_overall_status(
                PoolState::Running,
                WorkerCount {
                    started: 4,
                    live: 3
                },
                &checks
            ),
            HealthStatus::Degraded
        );
        assert_eq!(
            determine_overall_status(
                PoolState::Running,
                WorkerCount {
                    started: 4,
                    live: 0
                },
                &checks
            ),
            HealthStatus::Unhealthy
        );
    }

    #[test]
    fn unreachable_broker_is_unhealthy() {
        let checks = broker(ServiceHealth::unhealthy("down".to_string()));

        assert_eq!(
            determine_overall_status(PoolState::Running, all_live(4), &checks),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            determine_overall_status(
                PoolState::Closed,
                all_live(4),
                &broker(ServiceHealth::healthy(1))
            ),
            HealthStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn broker_check_is_cached_within_ttl() {
        let (checker, broker_check) = checker(Duration::from_secs(60));

        let first = checker.check_all().await;
        let second = checker.check_all().await;

        assert_eq!(first.status, HealthStatus::Healthy);
        assert_eq!(second.status, HealthStatus::Healthy);
        assert_eq!(broker_check.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_cache_checks_again() {
        let (checker, broker_check) = checker(Duration::ZERO);

        checker.check_all().await;
        checker.check_all().await;

        assert_eq!(broker_check.calls.load(Ordering::SeqCst), 2);
    }
}
