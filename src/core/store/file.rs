use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

use super::{AgentRecord, HasId, Mission, RecordStore, TaskRecord, select_by_ids};
use crate::core::error::{MissionError, RecordKind};

/// A JSON document on disk: `{"missions": [..], "agents": [..], "tasks": [..]}`.
///
/// The document is re-read on every fetch so edits show up without a restart.
pub struct FileRecordStore {
    path: PathBuf,
}

impl FileRecordStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>> {
        info!("Reading {} from {:?}", collection, self.path);
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            MissionError::upstream(
                None,
                format!("Record file {:?} unreadable: {}", self.path, e),
            )
        })?;
        let mut doc: Value = serde_json::from_str(&raw).map_err(|e| {
            MissionError::upstream(None, format!("Record file {:?} is not JSON: {}", self.path, e))
        })?;
        match doc.get_mut(collection).map(Value::take) {
            Some(Value::Array(items)) => Ok(items),
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(_) => Err(MissionError::upstream(
                None,
                format!("Record file {:?}: '{}' is not a list", self.path, collection),
            )
            .into()),
        }
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn fetch_mission(&self, id: &str) -> Result<Mission> {
        let items = self.list("missions").await?;
        items
            .iter()
            .filter_map(Mission::from_item)
            .find(|m| m.record_id() == id)
            .ok_or_else(|| MissionError::not_found(RecordKind::Mission, id).into())
    }

    async fn fetch_tasks_by_ids(&self, ids: &[String]) -> Result<Vec<TaskRecord>> {
        let items = self.list("tasks").await?;
        Ok(select_by_ids(&items, ids, TaskRecord::from_item))
    }

    async fn fetch_agents_by_ids(&self, ids: &[String]) -> Result<Vec<AgentRecord>> {
        let items = self.list("agents").await?;
        Ok(select_by_ids(&items, ids, AgentRecord::from_item))
    }
}
