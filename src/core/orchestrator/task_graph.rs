use tracing::{info, warn};

use super::types::{RunnableTask, TaskGraph};
use crate::core::agent::{AgentMaterializer, dedent};
use crate::core::error::{MissionError, RecordKind, SkippedRecord};
use crate::core::store::{AgentRecord, TaskRecord};

pub const PROJECT_FRAMING: &str = "\n This is one of the tasks for the following project: ";

/// Build runnable tasks from records, in stored order.
///
/// Each task gets a freshly materialized agent and sees every task built
/// before it as context. Records that cannot be built are logged, recorded in
/// the graph's skip list, and never become context for later tasks.
pub fn build_task_graph(
    records: &[TaskRecord],
    agent_records: &[AgentRecord],
    project_label: &str,
    materializer: &AgentMaterializer,
) -> TaskGraph {
    let mut graph = TaskGraph::new();

    for record in records {
        match build_task(record, agent_records, project_label, materializer) {
            Ok(task) => {
                let index = graph.push(task);
                info!(
                    mission = %materializer.mission_id(),
                    task = %record.id,
                    "Built task {} with {} context tasks",
                    index,
                    index
                );
            }
            Err(e) => {
                warn!(mission = %materializer.mission_id(), task = %record.id, "Skipping task: {}", e);
                graph.record_skip(SkippedRecord::from_error(RecordKind::Task, &record.id, &e));
            }
        }
    }

    graph
}

fn build_task(
    record: &TaskRecord,
    agent_records: &[AgentRecord],
    project_label: &str,
    materializer: &AgentMaterializer,
) -> Result<RunnableTask, MissionError> {
    let description = non_blank(record, "description", record.description.as_deref())?;
    let expected_output = non_blank(record, "expected_output", record.expected_output.as_deref())?;
    let agent_id = non_blank(record, "agent", record.agent_id.as_deref())?;

    let agent_record = agent_records
        .iter()
        .find(|a| a.id == agent_id)
        .ok_or_else(|| {
            MissionError::malformed(
                RecordKind::Task,
                &record.id,
                format!("assigned agent '{}' is not available", agent_id),
            )
        })?;

    let agent = materializer.materialize(agent_record).map_err(|e| {
        MissionError::malformed(
            RecordKind::Task,
            &record.id,
            format!("assigned agent '{}' could not be built: {}", agent_id, e),
        )
    })?;

    let framed = dedent(&format!("{}{}{}", description, PROJECT_FRAMING, project_label));

    Ok(RunnableTask::new(
        &record.id,
        record.name.clone().unwrap_or_default(),
        framed,
        expected_output,
        agent,
    ))
}

fn non_blank<'a>(
    record: &TaskRecord,
    field: &str,
    value: Option<&'a str>,
) -> Result<&'a str, MissionError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(MissionError::malformed(
            RecordKind::Task,
            &record.id,
            format!("missing {}", field),
        )),
    }
}
