use std::sync::Arc;

use crate::core::agent::RunnableAgent;
use crate::core::error::SkippedRecord;
use crate::core::tools::Tool;

/// A task bound to the agent that will work on it.
#[derive(Debug, Clone)]
pub struct RunnableTask {
    pub record_id: String,
    pub label: String,
    /// Stored description with the project framing appended.
    pub description: String,
    pub expected_output: String,
    pub agent: RunnableAgent,
    /// Number of tasks before this one in the graph that it sees as context.
    context_len: usize,
}

impl RunnableTask {
    pub fn new(
        record_id: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
        expected_output: impl Into<String>,
        agent: RunnableAgent,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            label: label.into(),
            description: description.into(),
            expected_output: expected_output.into(),
            agent,
            context_len: 0,
        }
    }

    pub fn context_len(&self) -> usize {
        self.context_len
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.agent.tools
    }

    /// Label when present, otherwise the record id.
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.record_id
        } else {
            &self.label
        }
    }
}

/// Append-only arena of built tasks. A task's context is the prefix of tasks
/// built before it.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: Vec<RunnableTask>,
    skipped: Vec<SkippedRecord>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `task`; its context becomes every task already in the graph.
    pub fn push(&mut self, mut task: RunnableTask) -> usize {
        task.context_len = self.tasks.len();
        self.tasks.push(task);
        self.tasks.len() - 1
    }

    pub fn record_skip(&mut self, skipped: SkippedRecord) {
        self.skipped.push(skipped);
    }

    pub fn tasks(&self) -> &[RunnableTask] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RunnableTask> {
        self.tasks.get(index)
    }

    /// Tasks visible as context to the task at `index`.
    pub fn context(&self, index: usize) -> &[RunnableTask] {
        match self.tasks.get(index) {
            Some(task) => &self.tasks[..task.context_len],
            None => &[],
        }
    }

    pub fn skipped(&self) -> &[SkippedRecord] {
        &self.skipped
    }
}

/// Classified output of one task.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum TaskOutput {
    Image(String),
    Text(String),
}

impl TaskOutput {
    pub fn data(&self) -> &str {
        match self {
            TaskOutput::Image(data) | TaskOutput::Text(data) => data,
        }
    }
}

/// Raw output of one executed task, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRawOutput {
    pub record_id: String,
    pub label: String,
    pub agent_role: String,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrewOutput {
    /// Output of the last task, empty when nothing ran.
    pub raw: String,
    pub task_outputs: Vec<TaskRawOutput>,
}

/// Everything a mission run hands back to its caller.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunResult {
    pub results: String,
    pub task_outputs: Vec<TaskOutput>,
    /// Wall-clock seconds.
    pub execution_time: f64,
    pub skipped: Vec<SkippedRecord>,
}
