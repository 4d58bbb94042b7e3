//! # Itinera Core
//!
//! Multi-agent travel itinerary orchestration: the expert agents, the model
//! gateway they talk through, and the two coordinators that chain them.
//!
//! ## Architecture
//!
//! - `gateway/` - OpenAI-compatible chat backend with a bounded tool loop
//! - `models` - LLM provider and model configuration
//! - `tools/` - current date and QWeather tools
//! - `skills/` - AnalyzerAgent, WeatherAgent, PlannerAgent and their registry
//! - `swarm/` - static pipeline, supervisor, gatekeeper, dynamic executor
//! - `state/` - in-memory run history
//!
//! ## Usage
//!
//! ```rust,ignore
//! use itinera_core::swarm::{Orchestrator, OrchestratorConfig, RunContext};
//!
//! let orchestrator = Orchestrator::from_config(OrchestratorConfig::default())?;
//! let report = orchestrator.run("2025年7月1日去北京3天", &RunContext::detached()).await?;
//! println!("{}", report.results.planner.text);
//! ```

pub mod gateway;
pub mod json;
pub mod models;
pub mod skills;
pub mod state;
pub mod swarm;
pub mod tools;
