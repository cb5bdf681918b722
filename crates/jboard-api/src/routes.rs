//! Route table and middleware stack.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, patch, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers;
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Build the application router.
///
/// `/api` routes sit behind the per-IP rate limiter; probes and metrics
/// bypass it. The static `/jobs/applications` segment takes priority over
/// the `/jobs/:job_id` capture.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let rate_limiter = Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    let job_routes = Router::new()
        .route("/jobs", get(handlers::list_jobs).post(handlers::post_job))
        .route("/jobs/applications", get(handlers::list_applications))
        .route(
            "/jobs/applications/:application_id/status",
            patch(handlers::set_application_status),
        )
        .route("/jobs/:job_id/apply", post(handlers::apply_to_job));

    let api_routes = Router::new().merge(job_routes).layer(
        middleware::from_fn_with_state(Arc::clone(&rate_limiter), rate_limit_middleware),
    );

    let health_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/healthz", get(handlers::health))
        .route("/ready", get(handlers::ready));

    let metrics_routes = match metrics_handle {
        Some(handle) => {
            Router::new().route("/metrics", get(move || async move { handle.render() }))
        }
        None => Router::new(),
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
