//! Job submission.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::{normalize_user_id, validate_source_url, MAX_URL_LENGTH, MAX_USER_ID_LENGTH};
use crate::state::AppState;

// validator's `length` bounds are u64.
const MAX_URL_LENGTH_U64: u64 = MAX_URL_LENGTH as u64;
const MAX_USER_ID_LENGTH_U64: u64 = MAX_USER_ID_LENGTH as u64;

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateVideoRequest {
    #[serde(alias = "sourceUrl", alias = "url")]
    #[validate(length(min = 1, max = MAX_URL_LENGTH_U64, message = "source_url is required"))]
    pub source_url: String,

    #[serde(rename = "userId", alias = "user_id")]
    #[validate(length(min = 1, max = MAX_USER_ID_LENGTH_U64, message = "userId is required"))]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    pub job_id: String,
}

/// Accept a job and return its id; processing continues in the background.
pub async fn generate_video(
    State(state): State<AppState>,
    payload: Result<Json<GenerateVideoRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<GenerateVideoResponse>)> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let source_url = validate_source_url(&request.source_url)
        .into_result()
        .map_err(ApiError::Validation)?;
    let user_id = normalize_user_id(&request.user_id)
        .ok_or_else(|| ApiError::Validation("userId is invalid".to_string()))?;

    let job_id = state.orchestrator.submit(&source_url, &user_id).await?;
    metrics::record_job_accepted();
    info!(job_id = %job_id, user_id = %user_id, "Accepted video generation job");

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateVideoResponse {
            job_id: job_id.to_string(),
        }),
    ))
}
