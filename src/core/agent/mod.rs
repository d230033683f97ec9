//! Turns stored agent records into runnable agents bound to the shared model.

use std::sync::Arc;
use tracing::{info, warn};

use crate::core::error::{MissionError, RecordKind, SkippedRecord};
use crate::core::llm::ModelHandle;
use crate::core::store::AgentRecord;
use crate::core::tools::{Tool, ToolRegistry};

/// An agent ready to work on tasks. Owned by one run; its tools are built
/// fresh for it and shared with no other agent.
#[derive(Clone)]
pub struct RunnableAgent {
    /// Id of the record this agent was built from. Empty for synthesized agents.
    pub record_id: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub allow_delegation: bool,
    pub verbose: bool,
    pub model: ModelHandle,
    pub tools: Vec<Arc<dyn Tool>>,
}

impl RunnableAgent {
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }
}

impl std::fmt::Debug for RunnableAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnableAgent")
            .field("record_id", &self.record_id)
            .field("role", &self.role)
            .field("allow_delegation", &self.allow_delegation)
            .field("model", &self.model)
            .field("tools", &self.tool_names())
            .finish()
    }
}

/// Materializes agents for one mission run.
pub struct AgentMaterializer {
    registry: Arc<ToolRegistry>,
    model: ModelHandle,
    mission_id: String,
}

impl AgentMaterializer {
    pub fn new(registry: Arc<ToolRegistry>, model: ModelHandle, mission_id: impl Into<String>) -> Self {
        Self {
            registry,
            model,
            mission_id: mission_id.into(),
        }
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    pub fn mission_id(&self) -> &str {
        &self.mission_id
    }

    /// Build one agent. Every call builds new tool instances.
    pub fn materialize(&self, record: &AgentRecord) -> Result<RunnableAgent, MissionError> {
        let role = required(record, "role", record.role.as_deref())?;
        let goal = required(record, "goal", record.goal.as_deref())?;
        let backstory = required(record, "backstory", record.backstory.as_deref())?;
        let allow_delegation = record.allow_delegation.ok_or_else(|| {
            MissionError::malformed(RecordKind::Agent, &record.id, "missing allow_delegation")
        })?;

        let tools = self.registry.build_all(&record.tools);
        if tools.len() < record.tools.len() {
            info!(
                mission = %self.mission_id,
                agent = %record.id,
                "Agent declared {} tools, {} recognized",
                record.tools.len(),
                tools.len()
            );
        }

        Ok(RunnableAgent {
            record_id: record.id.clone(),
            role: role.to_string(),
            goal: goal.to_string(),
            backstory: dedent(backstory).trim().to_string(),
            allow_delegation,
            verbose: true,
            model: self.model.clone(),
            tools,
        })
    }

    /// Build every agent that can be built, recording the rest.
    pub fn materialize_all(&self, records: &[AgentRecord]) -> (Vec<RunnableAgent>, Vec<SkippedRecord>) {
        let mut agents = Vec::with_capacity(records.len());
        let mut skipped = Vec::new();
        for record in records {
            match self.materialize(record) {
                Ok(agent) => agents.push(agent),
                Err(e) => {
                    warn!(mission = %self.mission_id, agent = %record.id, "Skipping agent: {}", e);
                    skipped.push(SkippedRecord::from_error(RecordKind::Agent, &record.id, &e));
                }
            }
        }
        (agents, skipped)
    }
}

fn required<'a>(
    record: &AgentRecord,
    field: &str,
    value: Option<&'a str>,
) -> Result<&'a str, MissionError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(MissionError::malformed(
            RecordKind::Agent,
            &record.id,
            format!("missing {}", field),
        )),
    }
}

/// Strip the whitespace prefix common to every non-blank line.
pub(crate) fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    text.lines()
        .map(|l| l.get(indent..).unwrap_or_else(|| l.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}
