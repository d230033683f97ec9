use anyhow::Result;
use tracing::info;

use crate::core::agent::RunnableAgent;
use crate::core::brain::AgentBrain;
use crate::core::orchestrator::delegation::{CoworkerPool, implicit_manager};
use crate::core::orchestrator::strategy::ManagerBinding;
use crate::core::orchestrator::types::RunnableTask;

/// The agent that manages the crew for a binding.
pub fn manager_for(binding: &ManagerBinding) -> RunnableAgent {
    match binding {
        ManagerBinding::Explicit(agent) => agent.clone(),
        ManagerBinding::Implicit(model) => implicit_manager(model.clone()),
    }
}

/// The manager works on the task, handing pieces to coworkers. Its only
/// actions are delegation and questions.
pub(super) async fn run_task(
    brain: &AgentBrain,
    manager: &RunnableAgent,
    agents: &[RunnableAgent],
    task: &RunnableTask,
    prompt: &str,
) -> Result<String> {
    let pool = CoworkerPool::new(agents, manager, brain);
    info!(
        "{} manages task '{}' with {} coworkers",
        manager.role,
        task.display_name(),
        pool.len()
    );

    let assignment = if !manager.record_id.is_empty() && task.agent.record_id == manager.record_id {
        "## Assignment\nThis task was assigned to you. Delegate parts of it if that helps.\n".to_string()
    } else {
        format!(
            "## Assignment\nThis task was assigned to the coworker \"{}\". \
             Delegate to them unless another coworker is better suited.\n",
            task.agent.role
        )
    };
    let prompt = format!("{}\n\n{}", prompt, assignment);

    brain.execute(manager, &prompt, &[], Some(&pool)).await
}
