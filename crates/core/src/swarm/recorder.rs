//! Progress recorder sinks.
//!
//! Recording is fire-and-forget: no sink can block or fail a run.

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use super::events::Record;

pub trait ProgressRecorder: Send + Sync {
    fn record(&self, record: Record);
}

/// Keeps every record in memory, in arrival order
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    records: Mutex<Vec<Record>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProgressRecorder for MemoryRecorder {
    fn record(&self, record: Record) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}

/// Broadcasts records to live subscribers; dropped when nobody listens
#[derive(Debug, Clone)]
pub struct ChannelRecorder {
    tx: broadcast::Sender<Record>,
}

impl ChannelRecorder {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn from_sender(tx: broadcast::Sender<Record>) -> Self {
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Record> {
        self.tx.subscribe()
    }
}

impl ProgressRecorder for ChannelRecorder {
    fn record(&self, record: Record) {
        let _ = self.tx.send(record);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecorder;

impl ProgressRecorder for NullRecorder {
    fn record(&self, _record: Record) {}
}

/// Sends every record to each sink in turn
#[derive(Default, Clone)]
pub struct Fanout {
    sinks: Vec<Arc<dyn ProgressRecorder>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ProgressRecorder>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl ProgressRecorder for Fanout {
    fn record(&self, record: Record) {
        for sink in &self.sinks {
            sink.record(record.clone());
        }
    }
}
