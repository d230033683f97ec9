//! Crew execution: runs every task of a crew in graph order.
//!
//! Execution is split by process:
//! - [sequential]: each task's own agent works on it
//! - [hierarchical]: a manager works on each task and delegates to coworkers
//!
//! Tasks run one at a time. A task's prompt carries the outputs of its
//! context tasks, which always ran before it. Any model failure aborts the run.

mod hierarchical;
mod sequential;

use anyhow::Result;
use tracing::info;

use super::strategy::{Crew, Process};
use super::types::{CrewOutput, RunnableTask, TaskRawOutput};
use crate::core::agent::RunnableAgent;
use crate::core::brain::AgentBrain;
use crate::core::error::MissionError;

pub use hierarchical::manager_for;

pub struct ExecutionEngine {
    brain: AgentBrain,
}

impl ExecutionEngine {
    pub fn new(brain: AgentBrain) -> Self {
        Self { brain }
    }

    pub fn brain(&self) -> &AgentBrain {
        &self.brain
    }

    /// Run the crew to completion. `raw` of the result is the last task's
    /// output.
    pub async fn kickoff(&self, crew: &Crew) -> Result<CrewOutput> {
        if crew.graph.is_empty() {
            return Err(MissionError::internal("no runnable tasks").into());
        }

        let manager: Option<RunnableAgent> = match &crew.process {
            Process::Sequential => None,
            Process::Hierarchical(binding) => Some(manager_for(binding)),
        };
        info!(
            "Kicking off crew: {} tasks, {} agents, {} process",
            crew.graph.len(),
            crew.agents.len(),
            crew.process.mode().as_str()
        );

        let mut outputs: Vec<TaskRawOutput> = Vec::with_capacity(crew.graph.len());
        for (index, task) in crew.graph.tasks().iter().enumerate() {
            let context = &outputs[..task.context_len().min(outputs.len())];
            let prompt = build_task_prompt(task, context);
            info!("Task {} ({}) starting", index + 1, task.display_name());

            let raw = match &manager {
                None => sequential::run_task(&self.brain, task, &prompt).await?,
                Some(manager) => {
                    hierarchical::run_task(&self.brain, manager, &crew.agents, task, &prompt).await?
                }
            };

            info!(
                "Task {} ({}) finished: {} chars",
                index + 1,
                task.display_name(),
                raw.len()
            );
            outputs.push(TaskRawOutput {
                record_id: task.record_id.clone(),
                label: task.label.clone(),
                agent_role: task.agent.role.clone(),
                raw,
            });
        }

        let raw = outputs.last().map(|o| o.raw.clone()).unwrap_or_default();
        Ok(CrewOutput {
            raw,
            task_outputs: outputs,
        })
    }
}

/// Prompt for one task: its description, the expected output, and the
/// outputs of the tasks it sees as context.
pub(crate) fn build_task_prompt(task: &RunnableTask, context: &[TaskRawOutput]) -> String {
    let mut parts = Vec::new();

    parts.push(format!("# YOUR TASK: {}\n", task.display_name()));
    parts.push(format!("## Description\n{}\n", task.description));
    parts.push(format!(
        "## Expected output\n{}\n",
        task.expected_output.trim()
    ));

    if !context.is_empty() {
        let mut section = String::from("## Context from earlier tasks\n");
        for output in context {
            let name = if output.label.is_empty() {
                &output.record_id
            } else {
                &output.label
            };
            section.push_str(&format!("### {} ({})\n{}\n\n", name, output.agent_role, output.raw));
        }
        parts.push(section);
    }

    parts.push(
        "This is VERY important to you, use the tools available and give your best Final Answer."
            .to_string(),
    );
    parts.join("\n")
}
