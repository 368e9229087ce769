use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures_util::FutureExt;
use tokio::{sync::watch, task::JoinSet, time::sleep};
use tracing::{debug, error, info, warn};

use crate::{
    broker::{MessageSource, SourceConnector},
    error::{BrokerError, ProcessError},
    models::{
        message::InboundMessage,
        pool::{DrainOutcome, PoolState, WorkerCount},
    },
    processor::EventProcessor,
};

const RECEIVE_BACKOFF: Duration = Duration::from_millis(500);

/// Fixed set of workers, each pulling from its own consumer handle and
/// feeding the shared processor. Workers only share the shutdown signal.
pub struct ConsumerPool<C: SourceConnector> {
    connector: C,
    processor: Arc<EventProcessor>,
    grace: Duration,
    shutdown: watch::Sender<bool>,
    state: watch::Sender<PoolState>,
    worker_count: Arc<watch::Sender<WorkerCount>>,
    workers: JoinSet<Result<(), BrokerError>>,
}

/// Read-only view of a pool for health reporting.
#[derive(Clone)]
pub struct PoolMonitor {
    state: watch::Receiver<PoolState>,
    workers: watch::Receiver<WorkerCount>,
}

impl PoolMonitor {
    pub fn new(state: watch::Receiver<PoolState>, workers: watch::Receiver<WorkerCount>) -> Self {
        Self { state, workers }
    }

    pub fn state(&self) -> PoolState {
        *self.state.borrow()
    }

    pub fn workers(&self) -> WorkerCount {
        *self.workers.borrow()
    }
}

impl<C: SourceConnector> ConsumerPool<C> {
    pub fn new(connector: C, processor: Arc<EventProcessor>, grace: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        let (state, _) = watch::channel(PoolState::Idle);
        let (worker_count, _) = watch::channel(WorkerCount::default());

        Self {
            connector,
            processor,
            grace,
            shutdown,
            state,
            worker_count: Arc::new(worker_count),
            workers: JoinSet::new(),
        }
    }

    pub fn state(&self) -> PoolState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PoolState> {
        self.state.subscribe()
    }

    pub fn monitor(&self) -> PoolMonitor {
        PoolMonitor::new(self.state.subscribe(), self.worker_count.subscribe())
    }

    /// Worker tasks not yet joined, including ones that have died.
    pub fn active_workers(&self) -> usize {
        self.workers.len()
    }

    /// Worker loops still running.
    pub fn live_workers(&self) -> usize {
        self.worker_count.borrow().live
    }

    /// Connects one source per worker, then launches the worker loops.
    /// Nothing is spawned if any connection fails.
    pub fn start(&mut self, worker_count: usize) -> Result<(), BrokerError> {
        if self.state() != PoolState::Idle {
            return Err(BrokerError::PoolStart(format!(
                "pool is {}",
                self.state()
            )));
        }

        if worker_count == 0 {
            return Err(BrokerError::PoolStart(
                "worker count must be at least 1".to_string(),
            ));
        }

        let sources = (0..worker_count)
            .map(|worker_id| self.connector.connect(worker_id))
            .collect::<Result<Vec<_>, _>>()?;

        self.worker_count.send_replace(WorkerCount {
            started: worker_count,
            live: worker_count,
        });

        for (worker_id, source) in sources.into_iter().enumerate() {
            let liveness = LivenessGuard {
                worker_id,
                counts: Arc::clone(&self.worker_count),
            };

            self.workers.spawn(run_worker(
                worker_id,
                source,
                Arc::clone(&self.processor),
                self.shutdown.subscribe(),
                liveness,
            ));
        }

        self.state.send_replace(PoolState::Running);

        info!(
            worker_count,
            event_types = ?self.processor.registry().event_types(),
            "Consumer pool started"
        );

        Ok(())
    }

    /// Stops every worker from pulling another message. In-flight messages
    /// keep running.
    pub fn cancel(&self) {
        self.state.send_if_modified(|state| {
            if *state == PoolState::Running {
                *state = PoolState::ShuttingDown;
                true
            } else {
                false
            }
        });

        self.shutdown.send_replace(true);
    }

    /// Cancels, waits up to the grace period for workers to finish, then
    /// aborts whatever is still running. Always leaves the pool `Closed`.
    ///
    /// Returns the first error a worker hit while closing its source.
    pub async fn close(&mut self) -> Result<DrainOutcome, BrokerError> {
        self.cancel();

        info!(
            grace_ms = self.grace.as_millis() as u64,
            workers = self.workers.len(),
            "Consumer pool shutting down"
        );

        let mut first_error = None;
        let workers = &mut self.workers;
        let drained = tokio::time::timeout(self.grace, async {
            while let Some(result) = workers.join_next().await {
                collect_exit(result, &mut first_error);
            }
        })
        .await
        .is_ok();

        let outcome = if drained {
            self.state.send_replace(PoolState::Drained);
            info!("All workers drained");
            DrainOutcome::Drained
        } else {
            let remaining = self.workers.len();
            warn!(
                workers = remaining,
                "Drain deadline reached, aborting in-flight workers"
            );
            self.workers.abort_all();
            while let Some(result) = self.workers.join_next().await {
                collect_exit(result, &mut first_error);
            }
            DrainOutcome::Aborted { workers: remaining }
        };

        self.state.send_replace(PoolState::Closed);
        info!("Consumer pool closed");

        match first_error {
            Some(e) => Err(e),
            None => Ok(outcome),
        }
    }
}

fn collect_exit(
    result: Result<Result<(), BrokerError>, tokio::task::JoinError>,
    first_error: &mut Option<BrokerError>,
) {
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            first_error.get_or_insert(e);
        }
        Err(e) if e.is_cancelled() => {}
        Err(e) => error!(error = %e, "Worker task ended abnormally"),
    }
}

/// Decrements the live worker count when a worker loop ends, however it ends.
struct LivenessGuard {
    worker_id: usize,
    counts: Arc<watch::Sender<WorkerCount>>,
}

impl Drop for LivenessGuard {
    fn drop(&mut self) {
        self.counts
            .send_modify(|counts| counts.live = counts.live.saturating_sub(1));

        if std::thread::panicking() {
            error!(
                worker_id = self.worker_id,
                live_workers = self.counts.borrow().live,
                "Worker died outside message handling"
            );
        }
    }
}

async fn run_worker<S: MessageSource>(
    worker_id: usize,
    mut source: S,
    processor: Arc<EventProcessor>,
    mut shutdown: watch::Receiver<bool>,
    _liveness: LivenessGuard,
) -> Result<(), BrokerError> {
    info!(worker_id, "Worker started");

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        let received = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            received = source.recv() => received,
        };

        let message = match received {
            Ok(message) => message,
            Err(BrokerError::Closed) => {
                info!(worker_id, "Message source closed");
                break;
            }
            Err(e) => {
                warn!(worker_id, error = %e, "Failed to pull message, backing off");
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => {}
                    _ = sleep(RECEIVE_BACKOFF) => {}
                }
                continue;
            }
        };

        handle_message(worker_id, &processor, &message).await;

        // Failed messages still advance the position; redelivery is the broker's concern.
        if let Err(e) = source.commit(&message).await {
            warn!(worker_id, error = %e, "Failed to commit message position");
        }
    }

    let closed = source.close().await;
    if let Err(e) = &closed {
        warn!(worker_id, error = %e, "Failed to close message source");
    }

    info!(worker_id, "Worker stopped");

    closed
}

async fn handle_message(worker_id: usize, processor: &EventProcessor, message: &InboundMessage) {
    let outcome = AssertUnwindSafe(processor.process(message))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(ProcessError::WorkerFault(panic_message(panic.as_ref()))));

    match outcome {
        Ok(()) => debug!(
            worker_id,
            partition = message.partition,
            offset = message.offset,
            "Message processed"
        ),
        Err(e) if e.is_dropped() => warn!(
            worker_id,
            partition = message.partition,
            offset = message.offset,
            error = %e,
            "Message dropped"
        ),
        Err(e) => error!(
            worker_id,
            partition = message.partition,
            offset = message.offset,
            error = %e,
            "Message processing failed"
        ),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
