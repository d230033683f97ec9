use tracing::{info, warn};

use super::types::TaskGraph;
use crate::core::agent::{AgentMaterializer, RunnableAgent};
use crate::core::llm::ModelHandle;
use crate::core::store::AgentRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessMode {
    Sequential,
    Hierarchical,
}

impl ProcessMode {
    /// `hierarchical` in any case selects hierarchical mode; anything else,
    /// including an empty string, is sequential.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("hierarchical") {
            ProcessMode::Hierarchical
        } else {
            ProcessMode::Sequential
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessMode::Sequential => "sequential",
            ProcessMode::Hierarchical => "hierarchical",
        }
    }
}

/// Who owns delegation decisions in hierarchical mode.
#[derive(Debug, Clone)]
pub enum ManagerBinding {
    /// A mission agent flagged for delegation.
    Explicit(RunnableAgent),
    /// No eligible agent; a manager is synthesized over the shared model.
    Implicit(ModelHandle),
}

#[derive(Debug, Clone)]
pub enum Process {
    Sequential,
    Hierarchical(ManagerBinding),
}

impl Process {
    pub fn mode(&self) -> ProcessMode {
        match self {
            Process::Sequential => ProcessMode::Sequential,
            Process::Hierarchical(_) => ProcessMode::Hierarchical,
        }
    }
}

/// The runnable unit: the mission's agents, its task graph, and how to run it.
#[derive(Debug, Clone)]
pub struct Crew {
    pub agents: Vec<RunnableAgent>,
    pub graph: TaskGraph,
    pub process: Process,
}

/// Resolve the process for a mission.
///
/// In hierarchical mode the first agent record, in mission order, whose
/// delegation flag is set becomes the manager. When none is flagged, or the
/// flagged one cannot be built, the manager is implicit.
pub fn select_process(
    mode: ProcessMode,
    agent_records: &[AgentRecord],
    materializer: &AgentMaterializer,
) -> Process {
    if mode == ProcessMode::Sequential {
        return Process::Sequential;
    }

    let Some(candidate) = agent_records.iter().find(|a| a.delegates()) else {
        info!(
            mission = %materializer.mission_id(),
            "No delegating agent, using an implicit manager"
        );
        return Process::Hierarchical(ManagerBinding::Implicit(materializer.model().clone()));
    };

    match materializer.materialize(candidate) {
        Ok(manager) => {
            info!(
                mission = %materializer.mission_id(),
                manager = %candidate.id,
                "Agent '{}' manages the crew",
                manager.role
            );
            Process::Hierarchical(ManagerBinding::Explicit(manager))
        }
        Err(e) => {
            warn!(
                mission = %materializer.mission_id(),
                manager = %candidate.id,
                "Manager agent could not be built, using an implicit manager: {}",
                e
            );
            Process::Hierarchical(ManagerBinding::Implicit(materializer.model().clone()))
        }
    }
}
