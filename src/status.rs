// src/status.rs
//! In-memory run status for the /status surface.
//!
//! One board per process. The pipeline reports stage completions into it
//! through the observer trait; the API reads a snapshot. State transitions
//! follow the run lifecycle: not_started → running → completed | failed,
//! and a new run resets the stage list.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::pipeline::{RunReport, Stage, StageObserver};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncStatus {
    NotStarted,
    Running { started_unix: u64 },
    Completed { report: RunReport },
    Failed { error: String, finished_unix: u64 },
}

/// One completed stage with the record count it produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageEvent {
    pub stage: Stage,
    pub records: usize,
}

/// What /status returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    #[serde(flatten)]
    pub status: SyncStatus,
    pub stages: Vec<StageEvent>,
}

#[derive(Debug)]
struct BoardInner {
    status: SyncStatus,
    stages: Vec<StageEvent>,
}

#[derive(Debug)]
pub struct StatusBoard {
    inner: Mutex<BoardInner>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BoardInner {
                status: SyncStatus::NotStarted,
                stages: Vec::new(),
            }),
        }
    }

    pub fn mark_running(&self) {
        let mut inner = self.inner.lock().expect("status mutex poisoned");
        inner.status = SyncStatus::Running {
            started_unix: now_unix(),
        };
        inner.stages.clear();
    }

    pub fn mark_completed(&self, report: RunReport) {
        let mut inner = self.inner.lock().expect("status mutex poisoned");
        inner.status = SyncStatus::Completed { report };
    }

    pub fn mark_failed(&self, error: impl Into<String>) {
        let mut inner = self.inner.lock().expect("status mutex poisoned");
        inner.status = SyncStatus::Failed {
            error: error.into(),
            finished_unix: now_unix(),
        };
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let inner = self.inner.lock().expect("status mutex poisoned");
        StatusSnapshot {
            status: inner.status.clone(),
            stages: inner.stages.clone(),
        }
    }
}

impl StageObserver for StatusBoard {
    fn stage_completed(&self, stage: Stage, records: usize) {
        let mut inner = self.inner.lock().expect("status mutex poisoned");
        inner.stages.push(StageEvent { stage, records });
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
