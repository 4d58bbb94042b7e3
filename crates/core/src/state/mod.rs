pub mod history;

pub use history::{HistoryRecorder, RetryRefused, RunEntry, RunHistory, RunStatus, RunSummary};
