use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};

/// Lifecycle of the consumer pool. Transitions only move forward:
/// `Idle -> Running -> ShuttingDown -> [Drained ->] Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    Idle,
    Running,
    ShuttingDown,
    Drained,
    Closed,
}

impl PoolState {
    pub fn as_str(&self) -> &str {
        match self {
            PoolState::Idle => "idle",
            PoolState::Running => "running",
            PoolState::ShuttingDown => "shutting_down",
            PoolState::Drained => "drained",
            PoolState::Closed => "closed",
        }
    }
}

impl Display for PoolState {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the drain phase of a shutdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every worker finished its in-flight message before the deadline.
    Drained,
    /// The deadline passed and this many workers were aborted.
    Aborted { workers: usize },
}

/// Workers launched by `start` and how many of them are still running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCount {
    pub started: usize,
    pub live: usize,
}

impl WorkerCount {
    pub fn has_dead_workers(&self) -> bool {
        self.live < self.started
    }
}
