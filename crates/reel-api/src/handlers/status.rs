//! Status polling and cancellation.
//!
//! Reads go straight to the ledger; the orchestrator is only involved in
//! cancellation.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use reel_ledger::JobStatusView;
use reel_models::JobId;
use reel_worker::CancelOutcome;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::{is_valid_job_id, normalize_user_id};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    pub user: Option<String>,
}

/// Latest job for a user, or `{"data": null}` when there is none.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LatestJobResponse {
    Found(JobStatusView),
    Empty { data: Option<JobStatusView> },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub job_id: String,
    pub cancelled: bool,
}

fn parse_job_id(raw: &str) -> ApiResult<JobId> {
    if !is_valid_job_id(raw) {
        return Err(ApiError::bad_request("invalid job id"));
    }
    Ok(JobId::from_string(raw))
}

/// Current status of a job. Unknown ids read as a fresh `pending` job.
pub async fn get_video_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusView>> {
    let job_id = parse_job_id(&job_id)?;
    let record = state.ledger.get(&job_id).await?;
    Ok(Json(JobStatusView::from_lookup(&job_id, record.as_ref())))
}

pub async fn get_latest_video_status(
    State(state): State<AppState>,
    Query(query): Query<LatestQuery>,
) -> ApiResult<Json<LatestJobResponse>> {
    let user = query
        .user
        .as_deref()
        .and_then(normalize_user_id)
        .ok_or_else(|| ApiError::bad_request("user query parameter is required"))?;

    let response = match state.ledger.latest_for_user(&user).await? {
        Some(record) => LatestJobResponse::Found(JobStatusView::from(&record)),
        None => LatestJobResponse::Empty { data: None },
    };
    Ok(Json(response))
}

pub async fn cancel_video_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<(StatusCode, Json<CancelResponse>)> {
    let job_id = parse_job_id(&job_id)?;
    let outcome = state.orchestrator.cancel(&job_id).await?;
    info!(job_id = %job_id, outcome = ?outcome, "Cancel requested");

    match outcome {
        CancelOutcome::Cancelled => {
            metrics::record_cancel_request("cancelled");
            Ok((
                StatusCode::ACCEPTED,
                Json(CancelResponse {
                    job_id: job_id.to_string(),
                    cancelled: true,
                }),
            ))
        }
        CancelOutcome::AlreadyTerminal => {
            metrics::record_cancel_request("already_terminal");
            Err(ApiError::conflict(format!("job {} already finished", job_id)))
        }
        CancelOutcome::NotFound => {
            metrics::record_cancel_request("not_found");
            Err(ApiError::not_found(format!("job {}", job_id)))
        }
    }
}
