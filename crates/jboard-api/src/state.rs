//! Shared application state.

use std::sync::Arc;

use jboard_firestore::{FirestoreClient, FirestoreConfig, JobRepository, UserRepository};
use tracing::info;

use crate::auth::TokenVerifier;
use crate::config::ApiConfig;
use crate::services::JobService;

/// Handles threaded through every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub firestore: Arc<FirestoreClient>,
    pub verifier: Arc<TokenVerifier>,
    pub jobs: JobService,
}

impl AppState {
    /// Build state from the environment: Firestore credentials, project
    /// selection and the token signing secret.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let firestore = FirestoreClient::new(FirestoreConfig::from_env()?).await?;
        let verifier = TokenVerifier::from_env()?;
        info!("Application state initialized");
        Ok(Self::from_parts(config, verifier, firestore))
    }

    /// Build state from preconstructed components. Tests use this to point
    /// the server at an emulator without touching the environment.
    pub fn from_parts(
        config: ApiConfig,
        verifier: TokenVerifier,
        firestore: FirestoreClient,
    ) -> Self {
        let jobs = JobService::new(
            JobRepository::new(firestore.clone()),
            UserRepository::new(firestore.clone()),
        );
        Self {
            config,
            firestore: Arc::new(firestore),
            verifier: Arc::new(verifier),
            jobs,
        }
    }
}
