use serde_json::Value;
use tracing::debug;

use super::types::TaskOutput;
use crate::core::error::MissionError;
use crate::core::images::ImageStore;

/// Classify a task's raw output.
///
/// An image marker (a JSON object with a string `image_file_name`) is
/// resolved to the stored payload; failing to read that payload is a run
/// error. Anything else is text, returned unchanged.
pub async fn classify_output(raw: &str, images: &ImageStore) -> Result<TaskOutput, MissionError> {
    let Some(name) = image_marker(raw) else {
        return Ok(TaskOutput::Text(raw.to_string()));
    };

    debug!("Task output references image {}", name);
    images
        .read(&name)
        .await
        .map(TaskOutput::Image)
        .map_err(|e| MissionError::internal(format!("{:#}", e)))
}

fn image_marker(raw: &str) -> Option<String> {
    match serde_json::from_str::<Value>(raw.trim()).ok()? {
        Value::Object(map) => map
            .get("image_file_name")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}
