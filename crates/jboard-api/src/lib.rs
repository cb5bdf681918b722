//! HTTP API server for the job board.
//!
//! Exposes the public job listing, posting creation for professional
//! bodies, applications for workers and the poster's review surface, all
//! on top of `jboard-firestore`.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::JobService;
pub use state::AppState;
