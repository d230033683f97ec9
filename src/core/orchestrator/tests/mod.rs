mod classification;

use std::sync::Arc;

use crate::core::agent::AgentMaterializer;
use crate::core::llm::testing::{ScriptedProvider, handle};
use crate::core::store::{AgentRecord, TaskRecord};
use crate::core::tools::testing::registry;

pub(super) fn agent_record(id: &str, role: &str, delegates: bool) -> AgentRecord {
    AgentRecord {
        id: id.to_string(),
        role: Some(role.to_string()),
        goal: Some(format!("Be the best {}", role)),
        backstory: Some(format!("A seasoned {}.", role)),
        allow_delegation: Some(delegates),
        tools: vec![],
    }
}

pub(super) fn task_record(id: &str, agent: &str) -> TaskRecord {
    TaskRecord {
        id: id.to_string(),
        name: Some(format!("Task {}", id)),
        agent_id: Some(agent.to_string()),
        description: Some(format!("Do the {} work", id)),
        expected_output: Some(format!("Output of {}", id)),
    }
}

pub(super) fn materializer_with(
    provider: &Arc<ScriptedProvider>,
    image_dir: &std::path::Path,
) -> AgentMaterializer {
    AgentMaterializer::new(Arc::new(registry(image_dir)), handle(provider), "m1")
}
