//! Read views shaped for the HTTP surface.
//!
//! Pure shaping only: repositories fetch postings and profiles, these
//! functions fold them into the wire shapes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{ApplicationId, ApplicationStatus, JobId, JobPosting};
use crate::profile::{PosterRef, UserProfile, WorkerRef};

/// One job posting on the public listing.
///
/// Applications themselves stay off the public surface; only the count is
/// exposed here. `posted_by` is always resolved to a name, falling back
/// to the sentinel.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobListing {
    pub id: JobId,
    pub title: String,
    pub posted_by: PosterRef,

    #[serde(flatten)]
    pub details: HashMap<String, serde_json::Value>,

    pub applications_count: u32,
    pub created_at: DateTime<Utc>,
}

impl JobListing {
    /// Shape a stored posting for the public listing.
    pub fn from_posting(job: JobPosting, profile: Option<&UserProfile>) -> Self {
        Self {
            posted_by: PosterRef::resolve(job.posted_by, profile),
            applications_count: job.applications.len() as u32,
            id: job.id,
            title: job.title,
            details: job.details,
            created_at: job.created_at,
        }
    }
}

/// Shape a batch of postings, resolving each poster against the profile
/// lookup results keyed by user id.
pub fn shape_listings(
    jobs: Vec<JobPosting>,
    profiles: &HashMap<String, UserProfile>,
) -> Vec<JobListing> {
    jobs.into_iter()
        .map(|job| {
            let profile = profiles.get(&job.posted_by);
            JobListing::from_posting(job, profile)
        })
        .collect()
}

/// Title wrapper kept nested on application records, matching the shape
/// clients already consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobTitle {
    pub title: String,
}

/// One row of the poster's flattened applications view.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApplicationRecord {
    pub application_id: ApplicationId,
    pub job_id: JobId,
    pub job: JobTitle,
    pub worker: WorkerRef,
    pub applied_at: DateTime<Utc>,
    pub status: ApplicationStatus,
}

/// Flatten every application of the poster's jobs into records, job order
/// first and application (insertion) order within each job. Worker
/// profiles are resolved from the lookup results; unresolved workers get
/// sentinel fields. An empty result is valid, not an error.
pub fn flatten_applications(
    jobs: Vec<JobPosting>,
    profiles: &HashMap<String, UserProfile>,
) -> Vec<ApplicationRecord> {
    jobs.into_iter()
        .flat_map(|job| {
            let job_id = job.id;
            let title = job.title;
            job.applications
                .into_iter()
                .map(move |app| ApplicationRecord {
                    application_id: app.id,
                    job_id: job_id.clone(),
                    job: JobTitle {
                        title: title.clone(),
                    },
                    worker: WorkerRef::resolve(app.worker.clone(), profiles.get(&app.worker)),
                    applied_at: app.applied_at,
                    status: app.status,
                })
        })
        .collect()
}
