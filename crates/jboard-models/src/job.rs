//! Job postings, embedded applications, and the lifecycle rules around them.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LifecycleError, LifecycleResult};

/// Unique identifier for a job posting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an application embedded in a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    /// Generate a new random application ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ApplicationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of an application on a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    /// Awaiting a decision from the poster
    #[default]
    Pending,
    /// Accepted by the poster (terminal)
    Accepted,
    /// Rejected by the poster (terminal)
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "accepted" => ApplicationStatus::Accepted,
            "rejected" => ApplicationStatus::Rejected,
            _ => ApplicationStatus::Pending,
        }
    }

    /// Accepted and rejected applications admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplicationStatus::Accepted | ApplicationStatus::Rejected)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A poster's decision on a pending application.
///
/// Deliberately excludes `pending`: a decided application can never be
/// moved back, and the exclusion holds at the type level for every caller
/// including deserialized request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationDecision {
    Accepted,
    Rejected,
}

impl ApplicationDecision {
    pub fn as_status(&self) -> ApplicationStatus {
        match self {
            ApplicationDecision::Accepted => ApplicationStatus::Accepted,
            ApplicationDecision::Rejected => ApplicationStatus::Rejected,
        }
    }
}

impl From<ApplicationDecision> for ApplicationStatus {
    fn from(decision: ApplicationDecision) -> Self {
        decision.as_status()
    }
}

/// A worker's application, embedded within a job posting.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Application {
    /// Unique application ID
    pub id: ApplicationId,

    /// Identifier of the applying worker; set once, immutable
    pub worker: String,

    /// When the application was appended
    pub applied_at: DateTime<Utc>,

    /// Current state in the pending/accepted/rejected machine
    #[serde(default)]
    pub status: ApplicationStatus,
}

impl Application {
    /// Create a new pending application for a worker.
    pub fn new(worker: impl Into<String>) -> Self {
        Self {
            id: ApplicationId::new(),
            worker: worker.into(),
            applied_at: Utc::now(),
            status: ApplicationStatus::Pending,
        }
    }
}

/// A posted job opportunity with its embedded applications.
///
/// `applications` is append-only except for in-place status mutation;
/// insertion order is application order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobPosting {
    /// Unique job ID
    pub id: JobId,

    /// Job title (required; surfaced on the poster's applications view)
    pub title: String,

    /// Identifier of the creating professional-body principal
    pub posted_by: String,

    /// Poster-supplied descriptive fields, carried opaquely
    #[serde(flatten)]
    pub details: HashMap<String, serde_json::Value>,

    /// Embedded applications in insertion order
    #[serde(default)]
    pub applications: Vec<Application>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Detail keys that would shadow first-class posting fields when the map
/// is flattened into the wire or stored representation.
const RESERVED_DETAIL_KEYS: [&str; 8] = [
    "id",
    "job_id",
    "title",
    "posted_by",
    "applications",
    "applications_count",
    "created_at",
    "updated_at",
];

impl JobPosting {
    /// Create a new job posting with no applications. Reserved keys are
    /// dropped from the details map.
    pub fn new(
        title: impl Into<String>,
        posted_by: impl Into<String>,
        mut details: HashMap<String, serde_json::Value>,
    ) -> Self {
        details.retain(|key, _| !RESERVED_DETAIL_KEYS.contains(&key.as_str()));
        let now = Utc::now();
        Self {
            id: JobId::new(),
            title: title.into(),
            posted_by: posted_by.into(),
            details,
            applications: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this worker already has an application on the job.
    pub fn has_applicant(&self, worker: &str) -> bool {
        self.applications.iter().any(|app| app.worker == worker)
    }

    /// Look up an embedded application by id.
    pub fn application(&self, id: &ApplicationId) -> Option<&Application> {
        self.applications.iter().find(|app| &app.id == id)
    }

    /// Append a new pending application for a worker.
    ///
    /// At most one application per distinct worker; a repeat attempt fails
    /// with `AlreadyApplied` and leaves the job untouched.
    pub fn apply(&mut self, worker: impl Into<String>) -> LifecycleResult<ApplicationId> {
        let worker = worker.into();
        if self.has_applicant(&worker) {
            return Err(LifecycleError::AlreadyApplied);
        }

        let application = Application::new(worker);
        let application_id = application.id.clone();
        self.applications.push(application);
        self.updated_at = Utc::now();
        Ok(application_id)
    }

    /// Apply a poster's decision to a pending application.
    ///
    /// Decisions are terminal: once an application is accepted or rejected
    /// any further decision fails with `AlreadyDecided`.
    pub fn set_application_status(
        &mut self,
        application_id: &ApplicationId,
        decision: ApplicationDecision,
    ) -> LifecycleResult<()> {
        let application = self
            .applications
            .iter_mut()
            .find(|app| &app.id == application_id)
            .ok_or_else(|| LifecycleError::ApplicationNotFound(application_id.clone()))?;

        if application.status.is_terminal() {
            return Err(LifecycleError::AlreadyDecided {
                current: application.status,
            });
        }

        application.status = decision.as_status();
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Request body for creating a job posting.
///
/// `title` is the only required field; everything else the poster sends
/// is kept as opaque payload on the posting.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateJobRequest {
    pub title: String,

    #[serde(flatten)]
    pub details: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting() -> JobPosting {
        JobPosting::new("Electrician needed", "body-1", HashMap::new())
    }

    #[test]
    fn test_new_posting_has_no_applications() {
        let job = posting();
        assert!(job.applications.is_empty());
        assert_eq!(job.posted_by, "body-1");
        assert!(!job.id.as_str().is_empty());
    }

    #[test]
    fn test_apply_appends_pending_application() {
        let mut job = posting();
        let id = job.apply("worker-1").unwrap();

        assert_eq!(job.applications.len(), 1);
        let app = job.application(&id).unwrap();
        assert_eq!(app.worker, "worker-1");
        assert_eq!(app.status, ApplicationStatus::Pending);
    }

    #[test]
    fn test_duplicate_application_is_rejected() {
        let mut job = posting();
        job.apply("worker-1").unwrap();

        let err = job.apply("worker-1").unwrap_err();
        assert_eq!(err, LifecycleError::AlreadyApplied);
        assert_eq!(job.applications.len(), 1);
    }

    #[test]
    fn test_distinct_workers_keep_insertion_order() {
        let mut job = posting();
        job.apply("worker-1").unwrap();
        job.apply("worker-2").unwrap();
        job.apply("worker-3").unwrap();

        let workers: Vec<&str> = job.applications.iter().map(|a| a.worker.as_str()).collect();
        assert_eq!(workers, vec!["worker-1", "worker-2", "worker-3"]);
    }

    #[test]
    fn test_accept_pending_application() {
        let mut job = posting();
        let id = job.apply("worker-1").unwrap();

        job.set_application_status(&id, ApplicationDecision::Accepted)
            .unwrap();
        assert_eq!(
            job.application(&id).unwrap().status,
            ApplicationStatus::Accepted
        );
    }

    #[test]
    fn test_reject_pending_application() {
        let mut job = posting();
        let id = job.apply("worker-1").unwrap();

        job.set_application_status(&id, ApplicationDecision::Rejected)
            .unwrap();
        assert_eq!(
            job.application(&id).unwrap().status,
            ApplicationStatus::Rejected
        );
    }

    #[test]
    fn test_decisions_are_terminal() {
        let mut job = posting();
        let id = job.apply("worker-1").unwrap();
        job.set_application_status(&id, ApplicationDecision::Accepted)
            .unwrap();

        let err = job
            .set_application_status(&id, ApplicationDecision::Rejected)
            .unwrap_err();
        assert_eq!(
            err,
            LifecycleError::AlreadyDecided {
                current: ApplicationStatus::Accepted
            }
        );
        assert_eq!(
            job.application(&id).unwrap().status,
            ApplicationStatus::Accepted
        );
    }

    #[test]
    fn test_unknown_application_id_is_not_found() {
        let mut job = posting();
        job.apply("worker-1").unwrap();

        let missing = ApplicationId::from_string("no-such-application");
        let err = job
            .set_application_status(&missing, ApplicationDecision::Accepted)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ApplicationNotFound(_)));
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            ApplicationStatus::Pending,
            ApplicationStatus::Accepted,
            ApplicationStatus::Rejected,
        ] {
            assert_eq!(ApplicationStatus::from_str(status.as_str()), status);
        }
        assert_eq!(
            ApplicationStatus::from_str("garbage"),
            ApplicationStatus::Pending
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ApplicationStatus::Pending.is_terminal());
        assert!(ApplicationStatus::Accepted.is_terminal());
        assert!(ApplicationStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_decision_request_rejects_pending() {
        // The wire type only admits the two decision values.
        assert!(serde_json::from_str::<ApplicationDecision>("\"accepted\"").is_ok());
        assert!(serde_json::from_str::<ApplicationDecision>("\"rejected\"").is_ok());
        assert!(serde_json::from_str::<ApplicationDecision>("\"pending\"").is_err());
    }

    #[test]
    fn test_create_request_keeps_opaque_fields() {
        let req: CreateJobRequest = serde_json::from_str(
            r#"{"title": "Plumber", "location": "Leeds", "pay": "£30/h"}"#,
        )
        .unwrap();

        assert_eq!(req.title, "Plumber");
        assert_eq!(req.details.get("location").unwrap(), "Leeds");
        assert_eq!(req.details.get("pay").unwrap(), "£30/h");
    }

    #[test]
    fn test_reserved_detail_keys_are_dropped() {
        let mut details = HashMap::new();
        details.insert("applications".to_string(), serde_json::json!(["bogus"]));
        details.insert("posted_by".to_string(), serde_json::json!("someone-else"));
        details.insert("location".to_string(), serde_json::json!("Leeds"));
        let job = JobPosting::new("Plumber", "body-1", details);

        assert_eq!(job.posted_by, "body-1");
        assert!(job.applications.is_empty());
        assert_eq!(job.details.len(), 1);
        assert_eq!(job.details.get("location").unwrap(), "Leeds");
    }

    #[test]
    fn test_posting_serializes_details_flat() {
        let mut details = HashMap::new();
        details.insert("location".to_string(), serde_json::json!("Leeds"));
        let job = JobPosting::new("Plumber", "body-1", details);

        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["location"], "Leeds");
        assert_eq!(value["title"], "Plumber");
        assert!(value.get("details").is_none());
    }
}
