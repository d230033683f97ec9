use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::{AgentRecord, HasId, Mission, RecordStore, TaskRecord, select_by_ids};
use crate::core::error::{MissionError, RecordKind};

/// Reads records from the CRUD API: `GET {endpoint}/missions|agents|tasks`.
pub struct HttpRecordStore {
    endpoint: String,
    client: Client,
}

impl HttpRecordStore {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>> {
        let url = format!("{}/{}", self.endpoint, collection);
        info!("Fetching {} from {}", collection, url);

        let res = self.client.get(&url).send().await.map_err(|e| {
            MissionError::upstream(None, format!("Record store unreachable at {}: {}", url, e))
        })?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(MissionError::upstream(
                Some(status.as_u16()),
                format!("Record store error for {}: {}", url, body),
            )
            .into());
        }

        let payload: Value = res.json().await.map_err(|e| {
            MissionError::upstream(
                Some(status.as_u16()),
                format!("Record store returned invalid JSON for {}: {}", url, e),
            )
        })?;
        let items = unwrap_listing(payload).ok_or_else(|| {
            MissionError::upstream(
                Some(status.as_u16()),
                format!("Record store returned an unexpected listing for {}", url),
            )
        })?;
        debug!("Fetched {} {} records", items.len(), collection);
        Ok(items)
    }
}

/// Accept a bare array or an API-gateway envelope whose `body` is an array or
/// a JSON-encoded array.
pub(crate) fn unwrap_listing(payload: Value) -> Option<Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => match map.remove("body")? {
            Value::Array(items) => Some(items),
            Value::String(encoded) => match serde_json::from_str::<Value>(&encoded).ok()? {
                Value::Array(items) => Some(items),
                _ => None,
            },
            _ => None,
        },
        _ => None,
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
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
