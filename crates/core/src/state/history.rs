//! # Run History
//!
//! Bounded in-memory record of recent runs: status, final results, the
//! dynamic run state and every progress record, keyed by run id. Each run
//! also gets a live broadcast channel for streaming its records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::swarm::{
    AgentResults, ChannelRecorder, DynamicRun, OrchestrationError, ProgressRecorder, Record,
    RunMode, RunReport,
};

/// Runs kept before the oldest is evicted
pub const DEFAULT_CAPACITY: usize = 100;

const LIVE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

/// Why a retry could not start
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryRefused {
    #[error("run {0} not found")]
    NotFound(String),
    #[error("run {0} has not completed")]
    NotCompleted(String),
    #[error("run {0} is not a dynamic run")]
    NotDynamic(String),
}

/// Everything known about one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEntry {
    pub id: String,
    pub query: String,
    pub mode: RunMode,
    pub status: RunStatus,
    pub fell_back: bool,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<AgentResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub records: Vec<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<DynamicRun>,
}

/// Listing view without records and results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: String,
    pub query: String,
    pub mode: RunMode,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub record_count: usize,
}

impl From<&RunEntry> for RunSummary {
    fn from(entry: &RunEntry) -> Self {
        Self {
            id: entry.id.clone(),
            query: entry.query.clone(),
            mode: entry.mode,
            status: entry.status,
            started_at: entry.started_at,
            finished_at: entry.finished_at,
            record_count: entry.records.len(),
        }
    }
}

#[derive(Default)]
struct HistoryInner {
    entries: VecDeque<RunEntry>,
    live: HashMap<String, ChannelRecorder>,
}

impl HistoryInner {
    fn entry_mut(&mut self, id: &str) -> Option<&mut RunEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }
}

/// Shared, bounded run history
#[derive(Clone)]
pub struct RunHistory {
    inner: Arc<Mutex<HistoryInner>>,
    capacity: usize,
}

impl Default for RunHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RunHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HistoryInner::default())),
            capacity: capacity.max(1),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut HistoryInner) -> R) -> Option<R> {
        match self.inner.lock() {
            Ok(mut inner) => Some(f(&mut inner)),
            Err(_) => {
                tracing::error!("run history lock poisoned");
                None
            }
        }
    }

    /// Register a new running entry, evicting the oldest when full
    pub fn start(&self, id: &str, query: &str, mode: RunMode) {
        let capacity = self.capacity;
        self.with(|inner| {
            while inner.entries.len() >= capacity {
                if let Some(evicted) = inner.entries.pop_front() {
                    tracing::debug!(run_id = %evicted.id, "evicting run from history");
                    inner.live.remove(&evicted.id);
                }
            }
            inner.entries.push_back(RunEntry {
                id: id.to_string(),
                query: query.to_string(),
                mode,
                status: RunStatus::Running,
                fell_back: false,
                started_at: Utc::now(),
                finished_at: None,
                results: None,
                error: None,
                records: Vec::new(),
                dynamic: None,
            });
            inner
                .live
                .insert(id.to_string(), ChannelRecorder::new(LIVE_CHANNEL_CAPACITY));
        });
    }

    /// Store the outcome of a run
    pub fn finish(&self, id: &str, outcome: &Result<RunReport, OrchestrationError>) {
        self.with(|inner| {
            if let Some(entry) = inner.entry_mut(id) {
                entry.finished_at = Some(Utc::now());
                match outcome {
                    Ok(report) => {
                        entry.status = RunStatus::Completed;
                        entry.mode = report.mode;
                        entry.fell_back = report.fell_back;
                        entry.results = Some(report.results.clone());
                        entry.dynamic = report.dynamic.clone();
                    }
                    Err(OrchestrationError::Cancelled) => {
                        entry.status = RunStatus::Cancelled;
                        entry.error = Some(OrchestrationError::Cancelled.to_string());
                    }
                    Err(e) => {
                        entry.status = RunStatus::Failed;
                        entry.error = Some(e.to_string());
                    }
                }
            }
            // Closing the channel ends live streams.
            inner.live.remove(id);
        });
    }

    /// Claim a completed dynamic run for a retry
    ///
    /// The entry goes back to `Running` with a fresh live channel, so a second
    /// retry is refused until [`RunHistory::finish_retry`] is called. Returns
    /// the dynamic state to retry against.
    pub fn begin_retry(&self, id: &str) -> Result<DynamicRun, RetryRefused> {
        self.with(|inner| {
            let entry = inner
                .entry_mut(id)
                .ok_or_else(|| RetryRefused::NotFound(id.to_string()))?;
            if entry.status != RunStatus::Completed {
                return Err(RetryRefused::NotCompleted(id.to_string()));
            }
            let run = entry
                .dynamic
                .clone()
                .ok_or_else(|| RetryRefused::NotDynamic(id.to_string()))?;

            entry.status = RunStatus::Running;
            entry.finished_at = None;
            entry.error = None;
            inner
                .live
                .insert(id.to_string(), ChannelRecorder::new(LIVE_CHANNEL_CAPACITY));
            Ok(run)
        })
        .unwrap_or_else(|| Err(RetryRefused::NotFound(id.to_string())))
    }

    /// Release a run claimed by [`RunHistory::begin_retry`]
    ///
    /// A successful retry replaces the dynamic state and results. A failed
    /// one keeps the previous state and only notes the error. Either way the
    /// run is `Completed` again and its live channel closes.
    pub fn finish_retry(&self, id: &str, outcome: Result<DynamicRun, String>) {
        self.with(|inner| {
            if let Some(entry) = inner.entry_mut(id) {
                entry.status = RunStatus::Completed;
                entry.finished_at = Some(Utc::now());
                match outcome {
                    Ok(run) => {
                        entry.results = Some(run.results.clone());
                        entry.dynamic = Some(run);
                    }
                    Err(e) => entry.error = Some(format!("retry failed: {e}")),
                }
            }
            inner.live.remove(id);
        });
    }

    pub fn append_record(&self, id: &str, record: Record) {
        self.with(|inner| {
            if let Some(entry) = inner.entry_mut(id) {
                entry.records.push(record.clone());
            }
            if let Some(live) = inner.live.get(id) {
                live.record(record);
            }
        });
    }

    pub fn get(&self, id: &str) -> Option<RunEntry> {
        self.with(|inner| inner.entries.iter().find(|e| e.id == id).cloned())
            .flatten()
    }

    pub fn records(&self, id: &str) -> Option<Vec<Record>> {
        self.get(id).map(|e| e.records)
    }

    /// Newest first
    pub fn list(&self) -> Vec<RunSummary> {
        self.with(|inner| inner.entries.iter().rev().map(RunSummary::from).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.with(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live records of a running run; `None` once it has finished
    pub fn subscribe(&self, id: &str) -> Option<broadcast::Receiver<Record>> {
        self.with(|inner| inner.live.get(id).map(|live| live.subscribe()))
            .flatten()
    }

    /// Recorder that files records under `run_id`
    pub fn recorder(&self, run_id: &str) -> HistoryRecorder {
        HistoryRecorder {
            history: self.clone(),
            run_id: run_id.to_string(),
        }
    }
}

/// Appends a run's records to its history entry and its live channel
#[derive(Clone)]
pub struct HistoryRecorder {
    history: RunHistory,
    run_id: String,
}

impl ProgressRecorder for HistoryRecorder {
    fn record(&self, record: Record) {
        self.history.append_record(&self.run_id, record);
    }
}
