//! Fixed-shape aggregate returned to the caller by either coordinator.

use serde::{Deserialize, Serialize};

use crate::skills::AgentKind;

/// Rendered text and raw JSON of one agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSlot {
    pub text: String,
    pub json: String,
}

impl ResultSlot {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.json.is_empty()
    }
}

/// One slot per agent; slots of agents that did not run stay empty
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResults {
    pub analysis: ResultSlot,
    pub weather: ResultSlot,
    pub planner: ResultSlot,
}

impl AgentResults {
    pub fn slot(&self, kind: AgentKind) -> &ResultSlot {
        match kind {
            AgentKind::Analyzer => &self.analysis,
            AgentKind::Weather => &self.weather,
            AgentKind::Planner => &self.planner,
        }
    }

    /// Fill a slot once; returns `false` and leaves it untouched if already set
    pub fn fill(&mut self, kind: AgentKind, text: String, json: String) -> bool {
        let slot = match kind {
            AgentKind::Analyzer => &mut self.analysis,
            AgentKind::Weather => &mut self.weather,
            AgentKind::Planner => &mut self.planner,
        };
        if !slot.is_empty() {
            return false;
        }
        *slot = ResultSlot { text, json };
        true
    }

    /// Agents whose slot holds a result
    pub fn filled(&self) -> Vec<AgentKind> {
        AgentKind::ALL
            .into_iter()
            .filter(|k| !self.slot(*k).is_empty())
            .collect()
    }
}
