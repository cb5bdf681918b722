//! Job posting and application lifecycle operations.
//!
//! Every mutation follows read, check, commit: the posting is fetched,
//! lifecycle rules run on the in-memory copy, and the write is guarded by
//! the update time captured at read. A contended commit re-reads and
//! re-runs the checks, so rule violations hold under concurrency too.

use std::time::Duration;

use jboard_firestore::{FirestoreError, JobRepository, UserRepository};
use jboard_models::{
    flatten_applications, shape_listings, ApplicationDecision, ApplicationId, ApplicationRecord,
    ApplicationStatus, CreateJobRequest, JobId, JobListing, JobPosting, Principal, Role,
};
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::metrics;

const COMMIT_ATTEMPTS: u32 = 5;
const RETRY_BACKOFF_MS: u64 = 50;

#[derive(Clone)]
pub struct JobService {
    jobs: JobRepository,
    users: UserRepository,
}

impl JobService {
    pub fn new(jobs: JobRepository, users: UserRepository) -> Self {
        Self { jobs, users }
    }

    /// Public catalogue of postings with resolved poster names.
    pub async fn list_jobs(&self) -> ApiResult<Vec<JobListing>> {
        let postings = self
            .jobs
            .list()
            .await
            .map_err(|e| ApiError::storage("Error fetching jobs", e))?;

        let poster_ids: Vec<String> = postings.iter().map(|job| job.posted_by.clone()).collect();
        let profiles = self
            .users
            .resolve_names(&poster_ids)
            .await
            .map_err(|e| ApiError::storage("Error fetching jobs", e))?;

        debug!(count = postings.len(), "Listed job postings");
        Ok(shape_listings(postings, &profiles))
    }

    /// Create a posting on behalf of a professional body.
    pub async fn post_job(
        &self,
        principal: &Principal,
        request: CreateJobRequest,
    ) -> ApiResult<JobPosting> {
        principal.require_role(Role::ProfessionalBody)?;

        if request.title.trim().is_empty() {
            return Err(ApiError::bad_request("Job title is required"));
        }

        let job = JobPosting::new(request.title, principal.id.clone(), request.details);
        self.jobs
            .create(&job)
            .await
            .map_err(|e| ApiError::storage("Error posting job", e))?;

        metrics::record_job_posted();
        info!(job_id = %job.id, posted_by = %job.posted_by, "Job posted");
        Ok(job)
    }

    /// Apply to a posting as a worker. Returns the new application id.
    ///
    /// Re-reading on contention keeps the one-application-per-worker rule
    /// intact when two requests race: the loser of the first commit sees
    /// the winner's application on the fresh snapshot.
    pub async fn apply_to_job(
        &self,
        principal: &Principal,
        job_id: &JobId,
    ) -> ApiResult<ApplicationId> {
        principal.require_role(Role::Worker)?;

        for attempt in 0..COMMIT_ATTEMPTS {
            let versioned = self
                .jobs
                .get(job_id)
                .await
                .map_err(|e| ApiError::storage("Error applying for job", e))?
                .ok_or_else(|| ApiError::not_found("Job not found"))?;

            let mut job = versioned.job;
            let application_id = job.apply(principal.id.as_str())?;

            match self
                .jobs
                .commit_new_application(&job, &application_id, versioned.update_time.as_deref())
                .await
            {
                Ok(()) => {
                    metrics::record_application_submitted();
                    info!(
                        job_id = %job_id,
                        application_id = %application_id,
                        worker = %principal.id,
                        "Application submitted"
                    );
                    return Ok(application_id);
                }
                Err(e) if e.is_precondition_failed() => {
                    metrics::record_commit_retry("apply");
                    debug!(job_id = %job_id, attempt, "Contended application write, retrying");
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(FirestoreError::NotFound(_)) => {
                    return Err(ApiError::not_found("Job not found"));
                }
                Err(e) => return Err(ApiError::storage("Error applying for job", e)),
            }
        }

        warn!(job_id = %job_id, "Application write contention persisted");
        Err(ApiError::internal("Error applying for job"))
    }

    /// Applications across all of the poster's jobs, flattened with
    /// worker contact details.
    pub async fn list_applications(
        &self,
        principal: &Principal,
    ) -> ApiResult<Vec<ApplicationRecord>> {
        principal.require_role(Role::ProfessionalBody)?;

        let postings = self
            .jobs
            .list_by_poster(&principal.id)
            .await
            .map_err(|e| ApiError::storage("Server error", e))?;

        let worker_ids: Vec<String> = postings
            .iter()
            .flat_map(|job| job.applications.iter().map(|app| app.worker.clone()))
            .collect();
        let profiles = self
            .users
            .resolve_contacts(&worker_ids)
            .await
            .map_err(|e| ApiError::storage("Server error", e))?;

        debug!(
            jobs = postings.len(),
            workers = worker_ids.len(),
            "Flattening applications for poster"
        );
        Ok(flatten_applications(postings, &profiles))
    }

    /// Decide a pending application on one of the poster's jobs.
    ///
    /// Only the posting owner may decide, and decisions are terminal: a
    /// second decision conflicts instead of overwriting. Both rules are
    /// re-checked on every contention retry.
    pub async fn set_application_status(
        &self,
        principal: &Principal,
        application_id: &ApplicationId,
        decision: ApplicationDecision,
    ) -> ApiResult<ApplicationStatus> {
        principal.require_role(Role::ProfessionalBody)?;

        let entry = self
            .jobs
            .find_application(application_id)
            .await
            .map_err(|e| ApiError::storage("Server error", e))?
            .ok_or_else(|| ApiError::not_found(format!("Application {application_id} not found")))?;

        for attempt in 0..COMMIT_ATTEMPTS {
            let versioned = self
                .jobs
                .get(&entry.job_id)
                .await
                .map_err(|e| ApiError::storage("Server error", e))?
                .ok_or_else(|| ApiError::not_found("Job not found"))?;

            let mut job = versioned.job;
            principal.require_owner(Role::ProfessionalBody, &job.posted_by)?;
            job.set_application_status(application_id, decision)?;

            match self
                .jobs
                .commit_status_change(&job, versioned.update_time.as_deref())
                .await
            {
                Ok(()) => {
                    let status = decision.as_status();
                    metrics::record_application_decided(status.as_str());
                    info!(
                        job_id = %job.id,
                        application_id = %application_id,
                        status = %status,
                        "Application decided"
                    );
                    return Ok(status);
                }
                Err(e) if e.is_precondition_failed() => {
                    metrics::record_commit_retry("set_application_status");
                    debug!(
                        application_id = %application_id,
                        attempt,
                        "Contended status write, retrying"
                    );
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(FirestoreError::NotFound(_)) => {
                    return Err(ApiError::not_found("Job not found"));
                }
                Err(e) => return Err(ApiError::storage("Server error", e)),
            }
        }

        warn!(application_id = %application_id, "Status write contention persisted");
        Err(ApiError::internal("Server error"))
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt + 1))
}
