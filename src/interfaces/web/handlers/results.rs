use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use super::super::AppState;
use crate::core::error::MissionError;
use crate::core::orchestrator::RunResult;

#[derive(serde::Deserialize)]
pub struct ResultsRequest {
    id: Option<String>,
    #[serde(rename = "apiEndpoint")]
    api_endpoint: Option<String>,
}

pub async fn results_endpoint(
    State(state): State<AppState>,
    Json(payload): Json<ResultsRequest>,
) -> Response {
    let Some(mission_id) = payload
        .id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
    else {
        return bad_request("Missing mission id");
    };

    let requested = payload
        .api_endpoint
        .map(|e| e.trim().trim_end_matches('/').to_string())
        .filter(|e| !e.is_empty());
    if let Some(endpoint) = &requested
        && !is_http_url(endpoint)
    {
        warn!("Refusing non-HTTP apiEndpoint {}", endpoint);
        return bad_request("apiEndpoint must be an http(s) URL");
    }

    let Some(store) = requested.or_else(|| state.default_store.clone()) else {
        return error_response(&MissionError::internal("No record store location configured"));
    };

    info!("Results requested for mission {} from {}", mission_id, store);
    match state.runner.run_mission(&mission_id, &store).await {
        Ok(result) => Json(result_body(&result)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Only the configured store may live on the local filesystem.
fn is_http_url(endpoint: &str) -> bool {
    url::Url::parse(endpoint).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message, "status": "bad_request" })),
    )
        .into_response()
}

/// `task_outputs` entries are themselves JSON documents encoded as strings.
fn result_body(result: &RunResult) -> serde_json::Value {
    let task_outputs: Vec<String> = result
        .task_outputs
        .iter()
        .filter_map(|o| serde_json::to_string(o).ok())
        .collect();
    serde_json::json!({
        "results": result.results,
        "task_outputs": task_outputs,
        "execution_time": result.execution_time,
        "skipped": result.skipped,
    })
}

fn error_response(err: &MissionError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    warn!("Responding {} to results request: {}", status, err);
    (
        status,
        Json(serde_json::json!({
            "error": err.to_string(),
            "status": err.status_class().as_str(),
        })),
    )
        .into_response()
}
