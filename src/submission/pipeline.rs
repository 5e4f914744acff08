use serde_json::{Value, json};
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::hka::{self, DocumentState, DocumentStatus, Environment, HkaCredentials, HkaError, StampResult};
use crate::models::{InvoiceSubmission, SubmissionSource, SubmissionStatus};
use crate::state::SharedState;

use super::payload;

pub struct SubmissionRequest {
    pub config_id: Option<Uuid>,
    pub environment: Environment,
    pub invoice: Value,
    pub source: SubmissionSource,
}

pub struct PipelineResult {
    pub submission: InvoiceSubmission,
    pub stamp: Option<StampResult>,
    pub duplicate: bool,
}

/// Receive an invoice: record it as `pending`, stamp it with HKA and record
/// the outcome.
pub async fn run(state: &SharedState, request: SubmissionRequest) -> Result<PipelineResult, AppError> {
    let hash = payload::payload_hash(&request.invoice);

    if let (SubmissionSource::Webhook, Some(config_id)) = (request.source, request.config_id) {
        if let Some(existing) =
            db::submissions::find_live_duplicate(
                &state.pool,
                config_id,
                request.environment.as_str(),
                &hash,
            )
            .await?
        {
            tracing::info!(
                "Duplicate webhook delivery for configuration {config_id}, returning submission {}",
                existing.id
            );
            return Ok(PipelineResult {
                submission: existing,
                stamp: None,
                duplicate: true,
            });
        }
    }

    let creds = resolve_credentials(state, request.config_id, request.environment).await?;

    let submission = db::submissions::create(
        &state.pool,
        &db::submissions::NewSubmission {
            invoice_data: &request.invoice,
            source: request.source,
            config_id: request.config_id,
            environment: request.environment.as_str(),
            payload_hash: &hash,
        },
    )
    .await?;

    tracing::info!(
        "Submission {} received ({}, {})",
        submission.id,
        request.source.as_str(),
        request.environment
    );

    stamp(state, submission, &creds).await
}

/// Stamp an existing failed, errored or stuck submission again.
///
/// A pending submission that already carries a CUFE was stamped by the
/// vendor, so it is reconciled against the vendor status instead of being
/// sent twice.
pub async fn retry(state: &SharedState, submission: InvoiceSubmission) -> Result<PipelineResult, AppError> {
    if submission.status() == Some(SubmissionStatus::Certified) {
        return Err(AppError::Conflict(format!(
            "Submission {} is already certified",
            submission.id
        )));
    }

    // Every submission is created against a configuration; a missing one was
    // deleted and must not fall back to the static credentials.
    let Some(config_id) = submission.config_id else {
        return Err(AppError::Conflict(format!(
            "Submission {} has no configuration and cannot be retried",
            submission.id
        )));
    };

    let environment: Environment = submission
        .environment
        .parse()
        .map_err(|e| AppError::Internal(format!("Submission {}: {e}", submission.id)))?;
    let creds = resolve_credentials(state, Some(config_id), environment).await?;

    if submission.status() == Some(SubmissionStatus::Pending) {
        if let Some(cufe) = submission.cufe.clone() {
            return settle_stamped(state, submission, &cufe, &creds).await;
        }
    }

    db::submissions::reset_to_pending(&state.pool, submission.id).await?;
    tracing::info!("Retrying submission {}", submission.id);

    let submission = InvoiceSubmission {
        status: SubmissionStatus::Pending.as_str().to_string(),
        ..submission
    };
    stamp(state, submission, &creds).await
}

async fn settle_stamped(
    state: &SharedState,
    mut submission: InvoiceSubmission,
    cufe: &str,
    creds: &HkaCredentials,
) -> Result<PipelineResult, AppError> {
    let vendor = state.hka.consultar_estado(creds, cufe).await?;

    match reconcile(state, &submission, &vendor).await? {
        Some(status) => {
            submission.status = status.as_str().to_string();
            Ok(PipelineResult {
                submission,
                stamp: None,
                duplicate: false,
            })
        }
        None => Err(AppError::Conflict(format!(
            "Submission {} was already sent to HKA as {cufe} (vendor status '{}'); \
             query /api/hka/status/{} instead of retrying",
            submission.id, vendor.vendor_status, submission.id
        ))),
    }
}

async fn resolve_credentials(
    state: &SharedState,
    config_id: Option<Uuid>,
    environment: Environment,
) -> Result<HkaCredentials, AppError> {
    hka::credentials::resolve(
        &state.pool,
        &state.config,
        state.hka.transport_kind(),
        config_id,
        environment,
    )
    .await
}

async fn stamp(
    state: &SharedState,
    mut submission: InvoiceSubmission,
    creds: &HkaCredentials,
) -> Result<PipelineResult, AppError> {
    match state.hka.timbrar(creds, &submission.invoice_data).await {
        Ok(result) => {
            let response_id = match persist_stamp(state, submission.id, &result).await {
                Ok(id) => id,
                Err(e) => {
                    tracing::error!(
                        "Submission {} was stamped as {} but the outcome could not be stored: {e}",
                        submission.id,
                        result.uuid
                    );
                    return Err(e.into());
                }
            };

            tracing::info!("Submission {} certified as {}", submission.id, result.uuid);

            submission.status = SubmissionStatus::Certified.as_str().to_string();
            submission.hka_response_id = Some(response_id);
            submission.cufe = Some(result.uuid.clone());

            Ok(PipelineResult {
                submission,
                stamp: Some(result),
                duplicate: false,
            })
        }
        Err(err) => {
            let status = if err.is_rejection() {
                SubmissionStatus::Failed
            } else {
                SubmissionStatus::Error
            };
            tracing::warn!("Submission {} {}: {err}", submission.id, status.as_str());
            record_failure(state, submission.id, &err, status).await;
            Err(AppError::Hka(err))
        }
    }
}

/// CUFE first: if a later write fails the submission stays pending but can
/// still be reconciled through a status query or a retry.
async fn persist_stamp(
    state: &SharedState,
    submission_id: Uuid,
    result: &StampResult,
) -> Result<Uuid, sqlx::Error> {
    db::submissions::set_cufe(&state.pool, submission_id, &result.uuid).await?;
    let record = db::hka_responses::create(&state.pool, submission_id, 200, &result.raw).await?;
    db::submissions::resolve(
        &state.pool,
        submission_id,
        SubmissionStatus::Certified,
        Some(record.id),
        Some(&result.uuid),
    )
    .await?;
    Ok(record.id)
}

/// Best-effort: storage failures here are logged, never returned, so the
/// caller still sees the vendor error.
async fn record_failure(state: &SharedState, submission_id: Uuid, err: &HkaError, status: SubmissionStatus) {
    let body = json!({
        "message": err.message,
        "body": err.body,
    });

    let response_id =
        match db::hka_responses::create(&state.pool, submission_id, i32::from(err.status), &body).await {
            Ok(record) => Some(record.id),
            Err(e) => {
                tracing::error!("Failed to store HKA error response for {submission_id}: {e}");
                None
            }
        };

    if let Err(e) =
        db::submissions::resolve(&state.pool, submission_id, status, response_id, None).await
    {
        tracing::error!("Failed to mark submission {submission_id} as {}: {e}", status.as_str());
    }
}

/// Bring a local `pending` submission in line with what the vendor reports.
/// Returns the new local status when one was written.
pub async fn reconcile(
    state: &SharedState,
    submission: &InvoiceSubmission,
    vendor: &DocumentStatus,
) -> Result<Option<SubmissionStatus>, AppError> {
    if submission.status() != Some(SubmissionStatus::Pending) {
        return Ok(None);
    }

    let target = match vendor.status {
        DocumentState::Stamped => SubmissionStatus::Certified,
        DocumentState::Failed => SubmissionStatus::Failed,
        _ => return Ok(None),
    };

    let status_code = if target == SubmissionStatus::Certified { 200 } else { 422 };
    let record =
        db::hka_responses::create(&state.pool, submission.id, status_code, &vendor.raw).await?;
    db::submissions::resolve(&state.pool, submission.id, target, Some(record.id), None).await?;

    tracing::info!(
        "Submission {} reconciled from pending to {} (vendor status {})",
        submission.id,
        target.as_str(),
        vendor.vendor_status
    );
    Ok(Some(target))
}
