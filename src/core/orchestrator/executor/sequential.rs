use anyhow::Result;

use crate::core::brain::AgentBrain;
use crate::core::orchestrator::types::RunnableTask;

/// The task's own agent works on it with the task's tools.
pub(super) async fn run_task(brain: &AgentBrain, task: &RunnableTask, prompt: &str) -> Result<String> {
    brain.execute(&task.agent, prompt, task.tools(), None).await
}
