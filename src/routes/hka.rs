use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::auth::extractor::AdminAuth;
use crate::db;
use crate::error::AppError;
use crate::hka::{self, DocumentState, HkaCredentials};
use crate::models::{InvoiceSubmission, SubmissionSource, SubmissionStatus};
use crate::state::SharedState;
use crate::submission::payload::{self, non_blank};
use crate::submission::pipeline;

use super::{parse_config_id, parse_environment};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimbrarRequest {
    pub invoice: Option<Value>,
    pub config_id: Option<String>,
    pub environment: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusParams {
    pub config_id: Option<String>,
    pub env: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub invoice_id: Option<String>,
    pub reason: Option<String>,
    pub config_id: Option<String>,
    pub environment: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoliosParams {
    pub config_id: Option<String>,
    pub env: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub environment: Option<String>,
    pub usuario: Option<String>,
    pub clave: Option<String>,
    pub api_key: Option<String>,
}

/// Manual submission.
pub async fn timbrar(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Json(req): Json<TimbrarRequest>,
) -> Result<Json<Value>, AppError> {
    let (Some(config_id), Some(environment), true) = (
        non_blank(req.config_id.as_deref()),
        non_blank(req.environment.as_deref()),
        payload::is_present(req.invoice.as_ref()),
    ) else {
        return Err(AppError::BadRequest(
            "Los campos invoice, configId y environment son requeridos.".to_string(),
        ));
    };

    let config_id = parse_config_id(Some(config_id))?;
    let environment = parse_environment(Some(environment), state.config.default_environment)?;

    let result = pipeline::run(
        &state,
        pipeline::SubmissionRequest {
            config_id,
            environment,
            invoice: req.invoice.unwrap_or(Value::Null),
            source: SubmissionSource::Manual,
        },
    )
    .await?;

    Ok(Json(json!({
        "status": result.submission.status,
        "submissionId": result.submission.id,
        "uuid": result.submission.cufe,
        "message": result.stamp.as_ref().map(|s| s.message.as_str()),
        "qr": result.stamp.as_ref().and_then(|s| s.qr.as_deref()),
    })))
}

/// Vendor status of a document. `invoice_id` is either a local submission id
/// or a vendor CUFE. Stuck `pending` submissions are reconciled on the way.
pub async fn status(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Path(invoice_id): Path<String>,
    Query(params): Query<StatusParams>,
) -> Result<Json<Value>, AppError> {
    let local = find_local(&state, &invoice_id).await?;

    if let Some(submission) = local.as_ref().filter(|s| s.cufe.is_none()) {
        // Known locally but never stamped, so there is nothing to ask HKA.
        let status = match submission.status() {
            Some(SubmissionStatus::Failed) | Some(SubmissionStatus::Error) => DocumentState::Failed,
            _ => DocumentState::Processing,
        };
        return Ok(Json(json!({
            "invoiceId": invoice_id,
            "status": status,
            "vendorStatus": null,
            "message": "La factura no tiene un CUFE asignado",
            "submissionStatus": submission.status,
        })));
    }

    let document_id = local
        .as_ref()
        .and_then(|s| s.cufe.clone())
        .unwrap_or_else(|| invoice_id.clone());

    let creds = credentials_for(
        &state,
        local.as_ref(),
        params.config_id.as_deref(),
        params.env.as_deref(),
    )
    .await?;
    let vendor = state.hka.consultar_estado(&creds, &document_id).await?;

    let mut submission_status = local.as_ref().map(|s| s.status.clone());
    if let Some(submission) = local.as_ref() {
        if let Some(updated) = pipeline::reconcile(&state, submission, &vendor).await? {
            submission_status = Some(updated.as_str().to_string());
        }
    }

    Ok(Json(json!({
        "invoiceId": invoice_id,
        "documentId": document_id,
        "status": vendor.status,
        "vendorStatus": vendor.vendor_status,
        "message": vendor.message,
        "submissionStatus": submission_status,
    })))
}

pub async fn cancel(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<Value>, AppError> {
    let (Some(invoice_id), Some(reason), Some(config_id), Some(environment)) = (
        non_blank(req.invoice_id.as_deref()),
        non_blank(req.reason.as_deref()),
        non_blank(req.config_id.as_deref()),
        non_blank(req.environment.as_deref()),
    ) else {
        return Err(AppError::BadRequest(
            "Los campos invoiceId, reason, configId y environment son requeridos.".to_string(),
        ));
    };

    let local = find_local(&state, invoice_id).await?;
    let document_id = match local.as_ref() {
        Some(submission) => submission.cufe.clone().ok_or_else(|| {
            AppError::Conflict(format!(
                "Submission {} has no CUFE and cannot be cancelled",
                submission.id
            ))
        })?,
        None => invoice_id.to_string(),
    };

    let creds =
        credentials_for(&state, local.as_ref(), Some(config_id), Some(environment)).await?;
    let result = state.hka.anular(&creds, &document_id, reason).await?;

    tracing::info!("Document {document_id} cancelled: {}", result.message);

    if let Some(submission) = local.as_ref() {
        let body = json!({ "operation": "cancel", "reason": reason, "response": result.raw });
        if let Err(e) = db::hka_responses::create(&state.pool, submission.id, 200, &body).await {
            tracing::error!("Failed to store cancellation response for {}: {e}", submission.id);
        }
    }

    Ok(Json(json!({
        "message": result.message,
        "invoiceId": invoice_id,
        "documentId": document_id,
    })))
}

pub async fn folios(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Query(params): Query<FoliosParams>,
) -> Result<Json<Value>, AppError> {
    let creds = credentials_for(
        &state,
        None,
        params.config_id.as_deref(),
        params.env.as_deref(),
    )
    .await?;
    let folios = state.hka.consultar_folios(&creds).await?;
    Ok(Json(json!({ "folios": folios })))
}

pub async fn validate(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<Value>, AppError> {
    let (Some(environment), Some(usuario), Some(clave)) = (
        non_blank(req.environment.as_deref()),
        non_blank(req.usuario.as_deref()),
        non_blank(req.clave.as_deref()),
    ) else {
        return Err(AppError::BadRequest(
            "Los campos environment, usuario y clave son requeridos.".to_string(),
        ));
    };

    let creds = HkaCredentials {
        environment: parse_environment(Some(environment), state.config.default_environment)?,
        user: usuario.to_string(),
        password: clave.to_string(),
        api_key: non_blank(req.api_key.as_deref()).map(str::to_string),
    };

    let validation = state.hka.validar(&creds).await?;
    Ok(Json(json!(validation)))
}

async fn find_local(
    state: &SharedState,
    invoice_id: &str,
) -> Result<Option<InvoiceSubmission>, AppError> {
    if let Ok(id) = invoice_id.parse::<Uuid>() {
        if let Some(submission) = db::submissions::find_by_id(&state.pool, id).await? {
            return Ok(Some(submission));
        }
    }
    Ok(db::submissions::find_by_cufe(&state.pool, invoice_id).await?)
}

/// Request parameters win; otherwise the local submission's configuration
/// and environment are used.
async fn credentials_for(
    state: &SharedState,
    local: Option<&InvoiceSubmission>,
    config_id: Option<&str>,
    env: Option<&str>,
) -> Result<HkaCredentials, AppError> {
    let config_id = match parse_config_id(config_id)? {
        Some(id) => Some(id),
        None => local.and_then(|s| s.config_id),
    };
    let default_env = match local.map(|s| s.environment.parse()) {
        Some(Ok(env)) => env,
        _ => state.config.default_environment,
    };
    let environment = parse_environment(env, default_env)?;

    hka::credentials::resolve(
        &state.pool,
        &state.config,
        state.hka.transport_kind(),
        config_id,
        environment,
    )
    .await
}
