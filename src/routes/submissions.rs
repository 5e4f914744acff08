use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::auth::extractor::AdminAuth;
use crate::db;
use crate::error::AppError;
use crate::models::{HkaResponseRecord, InvoiceSubmission, SubmissionStatus};
use crate::state::SharedState;
use crate::submission::pipeline;

use super::parse_config_id;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub status: Option<String>,
    pub config_id: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

pub async fn list(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, AppError> {
    let status = match params.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(
            SubmissionStatus::parse(s)
                .ok_or_else(|| AppError::BadRequest(format!("Invalid status: {s}")))?,
        ),
        None => None,
    };
    let config_id = parse_config_id(params.config_id.as_deref())?;

    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let list_params = db::submissions::ListParams {
        status,
        config_id,
        limit: per_page,
        offset,
    };

    let submissions = db::submissions::list(&state.pool, &list_params).await?;
    let total = db::submissions::count(&state.pool, status, config_id).await?;

    Ok(Json(json!({
        "submissions": submissions,
        "total": total,
        "page": page,
        "perPage": per_page,
        "totalPages": (total as f64 / per_page as f64).ceil() as i64,
    })))
}

pub async fn get(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let submission = find(&state, id).await?;

    let response = match submission.hka_response_id {
        Some(response_id) => db::hka_responses::find_by_id(&state.pool, response_id).await?,
        None => None,
    };

    Ok(Json(json!({
        "submission": submission,
        "response": response,
    })))
}

pub async fn responses(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<HkaResponseRecord>>, AppError> {
    find(&state, id).await?;
    let records = db::hka_responses::list_by_submission(&state.pool, id).await?;
    Ok(Json(records))
}

pub async fn retry(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let submission = find(&state, id).await?;
    let result = pipeline::retry(&state, submission).await?;

    Ok(Json(json!({
        "status": result.submission.status,
        "submissionId": result.submission.id,
        "uuid": result.submission.cufe,
        "message": result.stamp.as_ref().map(|s| s.message.as_str()),
    })))
}

async fn find(state: &SharedState, id: Uuid) -> Result<InvoiceSubmission, AppError> {
    db::submissions::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))
}
