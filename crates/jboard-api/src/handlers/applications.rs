//! Application review handlers for posters.

use axum::extract::{Path, State};
use axum::Json;
use jboard_models::{ApplicationDecision, ApplicationId, ApplicationRecord, ApplicationStatus};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: ApplicationDecision,
}

#[derive(Debug, Serialize)]
pub struct StatusUpdateResponse {
    pub message: String,
    pub application_id: ApplicationId,
    pub status: ApplicationStatus,
}

/// GET /api/jobs/applications
pub async fn list_applications(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<ApplicationRecord>>> {
    Ok(Json(state.jobs.list_applications(&user.principal()).await?))
}

/// PATCH /api/jobs/applications/:application_id/status
pub async fn set_application_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(application_id): Path<String>,
    Json(request): Json<StatusUpdateRequest>,
) -> ApiResult<Json<StatusUpdateResponse>> {
    let application_id = ApplicationId::from_string(application_id);
    let status = state
        .jobs
        .set_application_status(&user.principal(), &application_id, request.status)
        .await?;
    Ok(Json(StatusUpdateResponse {
        message: "Application status updated".to_string(),
        application_id,
        status,
    }))
}
