//! Job posting handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use jboard_models::{ApplicationId, CreateJobRequest, JobId, JobListing, JobPosting};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PostJobResponse {
    pub message: String,
    pub job: JobPosting,
}

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    pub message: String,
    pub application_id: ApplicationId,
}

/// GET /api/jobs
///
/// Public listing, no authentication.
pub async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<Vec<JobListing>>> {
    Ok(Json(state.jobs.list_jobs().await?))
}

/// POST /api/jobs
pub async fn post_job(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<PostJobResponse>)> {
    let job = state.jobs.post_job(&user.principal(), request).await?;
    Ok((
        StatusCode::CREATED,
        Json(PostJobResponse {
            message: "Job posted successfully".to_string(),
            job,
        }),
    ))
}

/// POST /api/jobs/:job_id/apply
pub async fn apply_to_job(
    State(state): State<AppState>,
    user: AuthUser,
    Path(job_id): Path<String>,
) -> ApiResult<Json<ApplyResponse>> {
    let job_id = JobId::from_string(job_id);
    let application_id = state.jobs.apply_to_job(&user.principal(), &job_id).await?;
    Ok(Json(ApplyResponse {
        message: "Application submitted successfully".to_string(),
        application_id,
    }))
}
