pub mod configurations;
pub mod hka;
pub mod submissions;
pub mod webhooks;

use axum::Router;
use axum::routing::{get, post};

use crate::error::AppError;
use crate::hka::Environment;
use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // HKA operations
        .route("/api/hka/timbrar", post(hka::timbrar))
        .route("/api/hka/status/{invoice_id}", get(hka::status))
        .route("/api/hka/cancel", post(hka::cancel))
        .route("/api/hka/folios", get(hka::folios))
        .route("/api/hka/validate", post(hka::validate))
        // Configurations
        .route(
            "/api/configurations",
            get(configurations::list).post(configurations::create),
        )
        .route(
            "/api/configurations/{id}",
            get(configurations::get)
                .put(configurations::update)
                .delete(configurations::delete),
        )
        // Submissions
        .route("/api/submissions", get(submissions::list))
        .route("/api/submissions/{id}", get(submissions::get))
        .route("/api/submissions/{id}/responses", get(submissions::responses))
        .route("/api/submissions/{id}/retry", post(submissions::retry))
}

pub fn webhook_routes() -> Router<SharedState> {
    Router::new().route(
        "/api/webhooks/invoices/{identifier}",
        post(webhooks::receive),
    )
}

/// Parse an environment name, falling back to the configured default when
/// absent.
pub(crate) fn parse_environment(
    raw: Option<&str>,
    default: Environment,
) -> Result<Environment, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s
            .parse()
            .map_err(|e| AppError::BadRequest(format!("Invalid environment: {e}"))),
        None => Ok(default),
    }
}

pub(crate) fn parse_config_id(raw: Option<&str>) -> Result<Option<uuid::Uuid>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("Invalid configId: {s}"))),
        None => Ok(None),
    }
}
