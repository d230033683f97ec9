//! `run_mission`: fetch a mission's records, build its crew, run it, and
//! classify the outputs.

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::core::agent::AgentMaterializer;
use crate::core::brain::AgentBrain;
use crate::core::error::MissionError;
use crate::core::images::ImageStore;
use crate::core::llm::{GenericProvider, ModelHandle};
use crate::core::orchestrator::{
    Crew, ExecutionEngine, ProcessMode, RunResult, build_task_graph, classify_output,
    select_process,
};
use crate::core::store::{RecordStore, resolve_store};
use crate::core::tools::{HttpImageBackend, ProcessCodeExecutor, ToolRegistry};

/// Shared, stateless collaborators for mission runs. One runner serves any
/// number of concurrent runs.
pub struct MissionRunner {
    model: ModelHandle,
    registry: Arc<ToolRegistry>,
    brain: AgentBrain,
    store_timeout: Duration,
}

impl MissionRunner {
    pub fn new(model: ModelHandle, registry: Arc<ToolRegistry>, brain: AgentBrain) -> Self {
        Self {
            model,
            registry,
            brain,
            store_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Wire the real model provider, image backend and code executor.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let provider = GenericProvider::new(config.llm.clone(), config.llm_api_key())?;
        let model = ModelHandle::new(Arc::new(provider), config.llm.model.clone());

        let image_backend = HttpImageBackend::new(&config.image, config.image_api_key())?;
        let registry = ToolRegistry::new(
            Arc::new(image_backend),
            ImageStore::new(config.image_dir()),
            Arc::new(ProcessCodeExecutor::new(&config.code.interpreter)),
            Duration::from_secs(config.code.timeout_secs),
        )
        .with_image_result_as_answer(config.image.result_as_answer);

        Ok(Self::new(
            model,
            Arc::new(registry),
            AgentBrain::new(config.llm.max_iterations),
        )
        .with_store_timeout(Duration::from_secs(config.store.timeout_secs)))
    }

    pub fn image_store(&self) -> &ImageStore {
        self.registry.image_store()
    }

    /// Run a mission whose records live at `store_location`.
    pub async fn run_mission(
        &self,
        mission_id: &str,
        store_location: &str,
    ) -> Result<RunResult, MissionError> {
        let store =
            resolve_store(store_location, self.store_timeout).map_err(MissionError::from_anyhow)?;
        self.run_with_store(mission_id, store.as_ref()).await
    }

    pub async fn run_with_store(
        &self,
        mission_id: &str,
        store: &dyn RecordStore,
    ) -> Result<RunResult, MissionError> {
        let started = Instant::now();
        let result = self.run_inner(mission_id, store, started).await;
        if let Err(ref e) = result {
            error!(
                mission = %mission_id,
                status = e.status_class().as_str(),
                "Mission run failed: {}",
                e
            );
        }
        result
    }

    async fn run_inner(
        &self,
        mission_id: &str,
        store: &dyn RecordStore,
        started: Instant,
    ) -> Result<RunResult, MissionError> {
        let mission = store
            .fetch_mission(mission_id)
            .await
            .map_err(MissionError::from_anyhow)?;
        info!(
            mission = %mission.id,
            "Running mission '{}' ({} agents, {} tasks, process '{}')",
            mission.name,
            mission.agent_ids.len(),
            mission.task_ids.len(),
            mission.process
        );

        let agent_records = store
            .fetch_agents_by_ids(&mission.agent_ids)
            .await
            .map_err(MissionError::from_anyhow)?;
        let task_records = store
            .fetch_tasks_by_ids(&mission.task_ids)
            .await
            .map_err(MissionError::from_anyhow)?;

        let materializer =
            AgentMaterializer::new(self.registry.clone(), self.model.clone(), &mission.id);
        let (agents, mut skipped) = materializer.materialize_all(&agent_records);
        let graph = build_task_graph(&task_records, &agent_records, &mission.game, &materializer);
        skipped.extend(graph.skipped().iter().cloned());
        let process = select_process(
            ProcessMode::parse(&mission.process),
            &agent_records,
            &materializer,
        );

        let crew = Crew {
            agents,
            graph,
            process,
        };
        let output = ExecutionEngine::new(self.brain.clone())
            .kickoff(&crew)
            .await
            .map_err(MissionError::from_anyhow)?;

        let mut task_outputs = Vec::with_capacity(output.task_outputs.len());
        for task_output in &output.task_outputs {
            task_outputs.push(classify_output(&task_output.raw, self.image_store()).await?);
        }

        let execution_time = started.elapsed().as_secs_f64();
        info!(
            mission = %mission.id,
            "Mission finished in {:.2}s with {} outputs, {} skipped records",
            execution_time,
            task_outputs.len(),
            skipped.len()
        );

        Ok(RunResult {
            results: output.raw,
            task_outputs,
            execution_time,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{RecordKind, StatusClass};
    use crate::core::llm::testing::{ScriptedProvider, handle, user_prompt};
    use crate::core::orchestrator::TaskOutput;
    use crate::core::store::FileRecordStore;
    use crate::core::tools::testing::registry;
    use serde_json::json;

    fn runner(provider: &Arc<ScriptedProvider>, image_dir: &std::path::Path) -> MissionRunner {
        MissionRunner::new(handle(provider), Arc::new(registry(image_dir)), AgentBrain::default())
    }

    fn write_records(dir: &std::path::Path, doc: serde_json::Value) -> std::path::PathBuf {
        let path = dir.join("records.json");
        std::fs::write(&path, doc.to_string()).unwrap();
        path
    }

    fn fixture() -> serde_json::Value {
        json!({
            "missions": [{
                "id": {"S": "m1"},
                "name": {"S": "Frog Quest"},
                "game": {"S": "Space Frogs"},
                "process": {"S": "sequential"},
                "agents": {"L": [{"S": "a1"}, {"S": "a2"}, {"S": "a3"}]},
                "tasks": {"L": [{"S": "t1"}, {"S": "t2"}, {"S": "t3"}]}
            }],
            "agents": [
                {"id": {"S": "a1"}, "role": {"S": "Designer"}, "goal": {"S": "Design"},
                 "backstory": {"S": "Veteran."}, "allow_delegation": {"BOOL": false},
                 "tools": {"L": []}},
                {"id": {"S": "a2"}, "role": {"S": "Artist"}, "goal": {"S": "Draw"},
                 "backstory": {"S": "Pixel pusher."}, "allow_delegation": {"BOOL": false},
                 "tools": {"L": [{"S": "ImageGenerator"}]}},
                {"id": {"S": "a3"}, "role": {"S": "Broken"}}
            ],
            "tasks": [
                {"id": {"S": "t1"}, "task": {"S": "Pitch"}, "agent": {"S": "a1"},
                 "description": {"S": "Pitch the game"}, "expected_output": {"S": "A pitch"}},
                {"id": {"S": "t2"}, "task": {"S": "Cover"}, "agent": {"S": "a2"},
                 "description": {"S": "Draw the cover"}, "expected_output": {"S": "An image"}},
                {"id": {"S": "t3"}, "task": {"S": "Test"}, "agent": {"S": "a3"},
                 "description": {"S": "Test it"}, "expected_output": {"S": "A report"}}
            ]
        })
    }

    #[tokio::test]
    async fn runs_mission_and_classifies_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let records = write_records(dir.path(), fixture());
        let provider = ScriptedProvider::with_responder(|messages| {
            if user_prompt(messages).contains("Draw the cover") {
                Ok(r#"<invoke name="ImageGenerator">{"prompt": "frog cover"}</invoke>"#.to_string())
            } else {
                Ok("Final Answer: Frogs in space!".to_string())
            }
        });
        let runner = runner(&provider, &dir.path().join("images"));

        let result = runner
            .run_mission("m1", records.to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(result.task_outputs.len(), 2);
        assert_eq!(result.task_outputs[0], TaskOutput::Text("Frogs in space!".to_string()));
        assert_eq!(result.task_outputs[1], TaskOutput::Image("QUJDMTIz".to_string()));
        assert!(result.results.contains("image_file_name"));
        assert!(result.execution_time >= 0.0);

        let skipped: Vec<(RecordKind, &str)> =
            result.skipped.iter().map(|s| (s.kind, s.id.as_str())).collect();
        assert_eq!(skipped, vec![(RecordKind::Agent, "a3"), (RecordKind::Task, "t3")]);
    }

    #[tokio::test]
    async fn unknown_mission_is_not_found_without_model_calls() {
        let dir = tempfile::tempdir().unwrap();
        let records = write_records(dir.path(), fixture());
        let provider = ScriptedProvider::new(Vec::<String>::new());
        let runner = runner(&provider, dir.path());

        let err = runner
            .run_mission("nope", records.to_str().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.status_class(), StatusClass::NotFound);
        assert_eq!(err.to_string(), "No mission found with ID: nope");
        assert_eq!(provider.call_count(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn mission_without_runnable_tasks_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = fixture();
        doc["missions"][0]["tasks"] = json!({"L": [{"S": "t3"}]});
        let store = FileRecordStore::new(write_records(dir.path(), doc));
        let provider = ScriptedProvider::new(Vec::<String>::new());

        let err = runner(&provider, dir.path())
            .run_with_store("m1", &store)
            .await
            .unwrap_err();
        assert_eq!(err.status_class(), StatusClass::InternalError);
        assert_eq!(err.http_status(), 500);
    }

    #[tokio::test]
    async fn model_outage_is_upstream_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(write_records(dir.path(), fixture()));
        let err = runner(&ScriptedProvider::failing(), dir.path())
            .run_with_store("m1", &store)
            .await
            .unwrap_err();
        assert_eq!(err.status_class(), StatusClass::UpstreamFailure);
        assert_eq!(err.http_status(), 503);
    }

    #[tokio::test]
    async fn unreadable_store_is_upstream_failure() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(Vec::<String>::new());
        let missing = dir.path().join("absent.json");
        let err = runner(&provider, dir.path())
            .run_mission("m1", missing.to_str().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.status_class(), StatusClass::UpstreamFailure);
    }
}
