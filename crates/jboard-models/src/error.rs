//! Lifecycle error taxonomy.

use thiserror::Error;

use crate::job::{ApplicationId, ApplicationStatus};

/// Result type for lifecycle rule checks.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Outcomes of a violated business rule.
///
/// These carry no transport detail; `jboard-api` maps each variant to an
/// HTTP status and a stable machine code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// Role or ownership mismatch.
    #[error("Access denied")]
    AccessDenied,

    /// The worker already has an application on this job.
    #[error("You have already applied for this job")]
    AlreadyApplied,

    /// The application has left `pending`; decisions are terminal.
    #[error("Application has already been {current}")]
    AlreadyDecided { current: ApplicationStatus },

    /// No embedded application with this id on the job.
    #[error("Application {0} not found")]
    ApplicationNotFound(ApplicationId),
}
