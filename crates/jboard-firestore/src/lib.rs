//! Firestore persistence layer for the JobBoard backend.
//!
//! Talks to the Firestore REST API directly (no generated gRPC stack) with
//! token caching, bounded retries and optimistic concurrency on document
//! update times. Repositories over the raw client live in [`job_repo`] and
//! [`user_repo`].

pub mod client;
pub mod error;
pub mod job_repo;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;
pub mod user_repo;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use retry::RetryConfig;
pub use job_repo::{ApplicationIndexEntry, JobRepository, VersionedJob};
pub use types::{Document, Value};
pub use user_repo::UserRepository;
