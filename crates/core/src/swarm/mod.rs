//! # Swarm Orchestration
//!
//! Coordinates the expert agents for one travel-planning run.
//!
//! ## Static path
//!
//! ```text
//! Query → AnalyzerAgent → WeatherAgent → PlannerAgent → AgentResults
//! ```
//!
//! ## Dynamic path
//!
//! ```text
//! Query → Supervisor (plan) → for each step: GateKeeper → Agent → OutputPool
//!                                                              └→ AgentResults
//! ```

pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod executor;
pub mod gatekeeper;
pub mod orchestrator;
pub mod pipeline;
pub mod plan;
pub mod pool;
pub mod recorder;
pub mod results;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{OrchestratorConfig, PlanningFallback, RunMode};
pub use context::RunContext;
pub use coordinator::StaticCoordinator;
pub use error::OrchestrationError;
pub use events::{ContentKind, Record, RecordKind};
pub use executor::{DynamicExecutor, DynamicRun, ExecutionStats, ExecutorState};
pub use gatekeeper::{AdaptedInput, GateKeeper};
pub use orchestrator::{Orchestrator, RunOptions, RunReport};
pub use pipeline::{Pipeline, StaticStage};
pub use plan::{PlanStep, StepOutput, StepStatus, TaskPlan};
pub use pool::{OutputPool, OutputPoolEntry};
pub use recorder::{ChannelRecorder, Fanout, MemoryRecorder, NullRecorder, ProgressRecorder};
pub use results::{AgentResults, ResultSlot};
pub use supervisor::Supervisor;
