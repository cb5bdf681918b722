//! Shared data models for the JobBoard backend.
//!
//! This crate provides Serde-serializable types for:
//! - Job postings and their embedded applications
//! - The application lifecycle state machine (pending/accepted/rejected)
//! - Principals, roles, and the authorization policy checks
//! - User profile read models and listing/report views
//!
//! Everything here is pure and synchronous; storage and transport live in
//! `jboard-firestore` and `jboard-api`.

pub mod error;
pub mod job;
pub mod principal;
pub mod profile;
pub mod views;

// Re-export common types
pub use error::{LifecycleError, LifecycleResult};
pub use job::{
    Application, ApplicationDecision, ApplicationId, ApplicationStatus, CreateJobRequest,
    JobId, JobPosting,
};
pub use principal::{Principal, Role};
pub use profile::{PosterRef, UserProfile, WorkerRef, UNKNOWN_POSTER};
pub use views::{flatten_applications, shape_listings, ApplicationRecord, JobListing, JobTitle};
