//! Run-level error taxonomy.
//!
//! Everything below the run boundary speaks `anyhow`; [`MissionError`] is what
//! a caller of `run_mission` (or the HTTP surface) gets back.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Mission,
    Agent,
    Task,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Mission => "mission",
            RecordKind::Agent => "agent",
            RecordKind::Task => "task",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    NotFound,
    UpstreamFailure,
    InternalError,
}

impl StatusClass {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusClass::NotFound => "not_found",
            StatusClass::UpstreamFailure => "upstream_failure",
            StatusClass::InternalError => "internal_error",
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum MissionError {
    #[error("No {kind} found with ID: {id}")]
    NotFound { kind: RecordKind, id: String },

    #[error("Upstream failure{}: {message}", .status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    UpstreamFailure {
        status: Option<u16>,
        message: String,
    },

    #[error("Malformed {kind} record '{id}': {reason}")]
    RecordMalformed {
        kind: RecordKind,
        id: String,
        reason: String,
    },

    #[error("{0}")]
    Internal(String),
}

impl MissionError {
    pub fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        MissionError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        MissionError::UpstreamFailure {
            status,
            message: message.into(),
        }
    }

    pub fn malformed(kind: RecordKind, id: impl Into<String>, reason: impl Into<String>) -> Self {
        MissionError::RecordMalformed {
            kind,
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        MissionError::Internal(message.into())
    }

    pub fn status_class(&self) -> StatusClass {
        match self {
            MissionError::NotFound { .. } => StatusClass::NotFound,
            MissionError::UpstreamFailure { .. } => StatusClass::UpstreamFailure,
            MissionError::RecordMalformed { .. } | MissionError::Internal(_) => {
                StatusClass::InternalError
            }
        }
    }

    /// HTTP status the web surface answers with.
    pub fn http_status(&self) -> u16 {
        match self {
            MissionError::NotFound { .. } => 404,
            MissionError::UpstreamFailure { status, .. } => match status {
                Some(code) if (400..=599).contains(code) => *code,
                _ => 502,
            },
            MissionError::RecordMalformed { .. } | MissionError::Internal(_) => 500,
        }
    }

    /// Recover the classification of an error that travelled through `anyhow`.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        if let Some(mission_err) = err.downcast_ref::<MissionError>() {
            return mission_err.clone();
        }
        if let Some(http_err) = err.downcast_ref::<reqwest::Error>() {
            return MissionError::upstream(
                http_err.status().map(|s| s.as_u16()),
                http_err.to_string(),
            );
        }
        MissionError::Internal(format!("{:#}", err))
    }
}

/// A record left out of a run, with the reason. Reported next to the results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    pub kind: RecordKind,
    pub id: String,
    pub reason: String,
}

impl SkippedRecord {
    pub fn new(kind: RecordKind, id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Record the failure of `id`. Malformed-record errors keep only their
    /// reason; anything else keeps its full message.
    pub fn from_error(kind: RecordKind, id: impl Into<String>, err: &MissionError) -> Self {
        let reason = match err {
            MissionError::RecordMalformed { reason, .. } => reason.clone(),
            other => other.to_string(),
        };
        SkippedRecord::new(kind, id, reason)
    }
}
