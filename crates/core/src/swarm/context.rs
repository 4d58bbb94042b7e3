//! Per-run context threaded through every component.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::error::OrchestrationError;
use super::events::Record;
use super::recorder::{NullRecorder, ProgressRecorder};

/// Identity, progress sink and cancellation token of one run
#[derive(Clone)]
pub struct RunContext {
    run_id: String,
    recorder: Arc<dyn ProgressRecorder>,
    cancel: CancellationToken,
}

impl RunContext {
    pub fn new(recorder: Arc<dyn ProgressRecorder>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            recorder,
            cancel: CancellationToken::new(),
        }
    }

    /// Context whose records go nowhere
    pub fn detached() -> Self {
        Self::new(Arc::new(NullRecorder))
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Stamp the run id and hand the record to the recorder
    pub fn record(&self, mut record: Record) {
        record.run_id = Some(self.run_id.clone());
        self.recorder.record(record);
    }

    pub fn check_cancelled(&self) -> Result<(), OrchestrationError> {
        if self.cancel.is_cancelled() {
            return Err(OrchestrationError::Cancelled);
        }
        Ok(())
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
