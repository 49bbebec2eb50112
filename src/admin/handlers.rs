use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::escalation::SchedulerSnapshot;
use crate::observability::MetricsSummary;
use crate::quarantine::{DataType, QuarantineError, QuarantineStats, QuarantinedItem};
use crate::resilience::CircuitBreakerState;

#[derive(Debug)]
pub enum AdminError {
    NotFound(String),
    Conflict(String),
}

impl From<QuarantineError> for AdminError {
    fn from(e: QuarantineError) -> Self {
        match e {
            QuarantineError::UnknownItem(_) => AdminError::NotFound(e.to_string()),
            other => AdminError::Conflict(other.to_string()),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AdminError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            AdminError::Conflict(m) => (StatusCode::CONFLICT, m),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub scheduler: SchedulerSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuarantineOverview {
    pub stats: QuarantineStats,
    pub pending: Vec<QuarantinedItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitSignal {
    pub data_type: DataType,
    pub content: serde_json::Value,
    pub source: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewConfirm {
    pub reviewer: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewReject {
    pub reason: String,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        scheduler: state.snapshot.load_full().as_ref().clone(),
    })
}

pub async fn get_breakers(State(state): State<AdminState>) -> Json<Vec<CircuitBreakerState>> {
    Json(state.breakers.snapshot())
}

pub async fn get_metrics(State(state): State<AdminState>) -> Json<MetricsSummary> {
    Json(state.sink.summary())
}

pub async fn get_quarantine(State(state): State<AdminState>) -> Json<QuarantineOverview> {
    let pending = state.quarantine.pending();
    Json(QuarantineOverview {
        stats: state.quarantine.stats(),
        pending,
    })
}

pub async fn submit_signal(
    State(state): State<AdminState>,
    Json(signal): Json<SubmitSignal>,
) -> (StatusCode, Json<QuarantinedItem>) {
    let item = state
        .quarantine
        .submit(signal.data_type, signal.content, &signal.source);
    tracing::info!(
        id = %item.id,
        data_type = %item.data_type,
        source = %signal.source,
        status = item.status.as_str(),
        "External signal received"
    );
    (StatusCode::ACCEPTED, Json(item))
}

pub async fn confirm_signal(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(review): Json<ReviewConfirm>,
) -> Result<Json<QuarantinedItem>, AdminError> {
    let item = state
        .quarantine
        .confirm(&id, &review.reviewer, review.notes.as_deref())?;
    Ok(Json(item))
}

pub async fn reject_signal(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(review): Json<ReviewReject>,
) -> Result<Json<QuarantinedItem>, AdminError> {
    Ok(Json(state.quarantine.reject(&id, &review.reason)?))
}

pub async fn mark_false_positive(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AdminError> {
    if state.sink.mark_false_positive(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AdminError::NotFound(format!("Unknown or already marked incident '{}'", id)))
    }
}
