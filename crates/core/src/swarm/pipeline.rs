//! # Pipeline Stages
//!
//! The static pipeline's state machine.

use serde::{Deserialize, Serialize};

use crate::skills::AgentKind;

/// Stage of the static pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaticStage {
    /// Extracting destination, dates and budget
    AnalyzeRequirements,
    /// Forecast for the analyzed destination and dates
    CollectWeather,
    /// Day-by-day itinerary from analysis + weather
    PlanItinerary,
    /// Complete
    Complete,
    /// Failed
    Failed,
}

impl StaticStage {
    /// Agent this stage runs, if any
    pub fn agent(&self) -> Option<AgentKind> {
        match self {
            StaticStage::AnalyzeRequirements => Some(AgentKind::Analyzer),
            StaticStage::CollectWeather => Some(AgentKind::Weather),
            StaticStage::PlanItinerary => Some(AgentKind::Planner),
            StaticStage::Complete | StaticStage::Failed => None,
        }
    }

    /// Progress labels (started, finished)
    pub fn labels(&self) -> (&'static str, &'static str) {
        match self {
            StaticStage::AnalyzeRequirements => ("执行需求分析任务...", "需求分析任务完成"),
            StaticStage::CollectWeather => ("执行天气收集任务...", "天气收集任务完成"),
            StaticStage::PlanItinerary => ("执行行程规划任务...", "行程规划任务完成"),
            StaticStage::Complete => ("", "全部任务完成"),
            StaticStage::Failed => ("", "任务失败"),
        }
    }
}

/// The pipeline state machine
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Current stage
    pub stage: StaticStage,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            stage: StaticStage::AnalyzeRequirements,
        }
    }
}

impl Pipeline {
    /// Create a new pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to the next stage
    pub fn advance(&mut self) {
        self.stage = match self.stage {
            StaticStage::AnalyzeRequirements => StaticStage::CollectWeather,
            StaticStage::CollectWeather => StaticStage::PlanItinerary,
            StaticStage::PlanItinerary => StaticStage::Complete,
            StaticStage::Complete => StaticStage::Complete,
            StaticStage::Failed => StaticStage::Failed,
        };
    }

    /// Fail the pipeline
    pub fn fail(&mut self) {
        self.stage = StaticStage::Failed;
    }

    /// Check if pipeline is complete
    pub fn is_complete(&self) -> bool {
        matches!(self.stage, StaticStage::Complete | StaticStage::Failed)
    }

    /// Check if pipeline succeeded
    pub fn is_success(&self) -> bool {
        self.stage == StaticStage::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_advance() {
        let mut pipeline = Pipeline::new();
        assert_eq!(pipeline.stage.agent(), Some(AgentKind::Analyzer));

        pipeline.advance();
        assert_eq!(pipeline.stage, StaticStage::CollectWeather);

        pipeline.advance();
        assert_eq!(pipeline.stage.agent(), Some(AgentKind::Planner));

        pipeline.advance();
        assert!(pipeline.is_success());

        pipeline.advance();
        assert_eq!(pipeline.stage, StaticStage::Complete);
    }

    #[test]
    fn test_failure_is_terminal() {
        let mut pipeline = Pipeline::new();
        pipeline.advance();
        pipeline.fail();
        assert!(pipeline.is_complete());
        assert!(!pipeline.is_success());

        pipeline.advance();
        assert_eq!(pipeline.stage, StaticStage::Failed);
        assert_eq!(pipeline.stage.agent(), None);
    }
}
