//! HTTP API for the antiquity oracle
//!
//! Provides:
//! - Attestation endpoints (challenge, submit, classify)
//! - Settlement weight queries
//! - Security middleware (rate limiting, body limits, headers)

pub mod attestation;
pub mod middleware;

use axum::{Router, extract::DefaultBodyLimit, middleware as axum_middleware};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::OracleConfig;

pub use attestation::{AttestationApiState, OracleVerifier, create_router, status_for};
pub use middleware::{
    RateLimiter, SecurityMiddlewareConfig, SecurityState, body_size_middleware,
    logging_middleware, rate_limit_middleware, security_headers_middleware,
};

/// Middleware settings derived from the oracle configuration
pub fn security_config(config: &OracleConfig) -> SecurityMiddlewareConfig {
    SecurityMiddlewareConfig {
        rate_limit_per_minute: config.security.rate_limit_per_minute,
        max_request_size: config.security.max_request_size,
        log_requests: config.logging.log_requests,
        sanitize_logs: config.logging.sanitize_logs,
        trusted_proxies: config.security.trusted_proxies.clone(),
    }
}

/// Full application: routes plus the security middleware stack.
pub fn build_app(verifier: Arc<OracleVerifier>, security_state: SecurityState) -> Router {
    create_router(AttestationApiState::new(verifier))
        // Bodies without Content-Length are capped while they are read
        .layer(DefaultBodyLimit::max(security_state.config.max_request_size))
        // Apply security middleware layers (last added runs first)
        .layer(axum_middleware::from_fn_with_state(
            security_state.clone(),
            body_size_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            security_state.clone(),
            rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            security_state,
            logging_middleware,
        ))
        .layer(axum_middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
}
