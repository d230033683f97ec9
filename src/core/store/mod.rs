//! Record store gateway: read-only access to mission, agent and task records.

mod file;
mod http;
pub mod records;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

pub use file::FileRecordStore;
pub use http::HttpRecordStore;
pub use records::{AgentRecord, Mission, TaskRecord};

use crate::core::error::MissionError;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fails with [`MissionError::NotFound`] when no mission carries `id`.
    async fn fetch_mission(&self, id: &str) -> Result<Mission>;

    /// Records in the order of `ids`; unknown ids are omitted.
    async fn fetch_tasks_by_ids(&self, ids: &[String]) -> Result<Vec<TaskRecord>>;

    /// Records in the order of `ids`; unknown ids are omitted.
    async fn fetch_agents_by_ids(&self, ids: &[String]) -> Result<Vec<AgentRecord>>;
}

/// Pick a store implementation from a location string.
///
/// `http://` / `https://` locations use the HTTP gateway, `file://` URLs and
/// bare paths use a JSON document on disk.
pub fn resolve_store(location: &str, timeout: Duration) -> Result<Box<dyn RecordStore>> {
    let location = location.trim().trim_end_matches('/');
    if location.is_empty() {
        return Err(MissionError::internal("No record store location configured").into());
    }

    match url::Url::parse(location) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
            Ok(Box::new(HttpRecordStore::new(location, timeout)?))
        }
        Ok(parsed) if parsed.scheme() == "file" => {
            let path = parsed.to_file_path().map_err(|_| {
                MissionError::internal(format!("Invalid file store location: {}", location))
            })?;
            Ok(Box::new(FileRecordStore::new(path)))
        }
        Ok(parsed) if parsed.scheme().len() > 1 => Err(MissionError::internal(format!(
            "Unsupported record store scheme: {}",
            parsed.scheme()
        ))
        .into()),
        // Bare paths (and Windows drive letters, which parse as one-letter schemes)
        _ => Ok(Box::new(FileRecordStore::new(location.into()))),
    }
}

/// Pick the items whose id appears in `ids`, in `ids` order.
///
/// A listed id that appears twice yields its record twice, matching how the
/// mission's own lists are meant to be read.
pub(crate) fn select_by_ids<T, F>(items: &[Value], ids: &[String], parse: F) -> Vec<T>
where
    F: Fn(&Value) -> Option<T>,
    T: HasId + Clone,
{
    let parsed: Vec<T> = items
        .iter()
        .filter_map(|item| {
            let record = parse(item);
            if record.is_none() {
                warn!("Dropping stored record without an id");
            }
            record
        })
        .collect();

    ids.iter()
        .filter_map(|id| parsed.iter().find(|r| r.record_id() == id).cloned())
        .collect()
}

pub(crate) trait HasId {
    fn record_id(&self) -> &str;
}

impl HasId for AgentRecord {
    fn record_id(&self) -> &str {
        &self.id
    }
}

impl HasId for TaskRecord {
    fn record_id(&self) -> &str {
        &self.id
    }
}

impl HasId for Mission {
    fn record_id(&self) -> &str {
        &self.id
    }
}
