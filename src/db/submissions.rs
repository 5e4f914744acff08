use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{InvoiceSubmission, SubmissionSource, SubmissionStatus};

pub struct NewSubmission<'a> {
    pub invoice_data: &'a serde_json::Value,
    pub source: SubmissionSource,
    pub config_id: Option<Uuid>,
    pub environment: &'a str,
    pub payload_hash: &'a str,
}

/// Insert a submission in `pending` state.
pub async fn create(
    pool: &PgPool,
    new: &NewSubmission<'_>,
) -> Result<InvoiceSubmission, sqlx::Error> {
    sqlx::query_as::<_, InvoiceSubmission>(
        "INSERT INTO invoice_submissions (id, invoice_data, status, source, config_id, environment, payload_hash)
         VALUES ($1, $2, 'pending', $3, $4, $5, $6) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(new.invoice_data)
    .bind(new.source.as_str())
    .bind(new.config_id)
    .bind(new.environment)
    .bind(new.payload_hash)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<InvoiceSubmission>, sqlx::Error> {
    sqlx::query_as::<_, InvoiceSubmission>("SELECT * FROM invoice_submissions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Most recent submission certified under the given vendor document id.
pub async fn find_by_cufe(
    pool: &PgPool,
    cufe: &str,
) -> Result<Option<InvoiceSubmission>, sqlx::Error> {
    sqlx::query_as::<_, InvoiceSubmission>(
        "SELECT * FROM invoice_submissions WHERE cufe = $1
         ORDER BY submission_date DESC LIMIT 1",
    )
    .bind(cufe)
    .fetch_optional(pool)
    .await
}

/// An earlier delivery of the same payload to the same configuration and
/// environment that is still pending or already certified.
pub async fn find_live_duplicate(
    pool: &PgPool,
    config_id: Uuid,
    environment: &str,
    payload_hash: &str,
) -> Result<Option<InvoiceSubmission>, sqlx::Error> {
    sqlx::query_as::<_, InvoiceSubmission>(
        "SELECT * FROM invoice_submissions
         WHERE config_id = $1 AND environment = $2 AND payload_hash = $3
           AND status IN ('pending', 'certified')
         ORDER BY submission_date DESC LIMIT 1",
    )
    .bind(config_id)
    .bind(environment)
    .bind(payload_hash)
    .fetch_optional(pool)
    .await
}

/// Store the vendor document id as soon as it is known, ahead of the
/// response record and status update.
pub async fn set_cufe(pool: &PgPool, id: Uuid, cufe: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE invoice_submissions SET cufe = $2 WHERE id = $1")
        .bind(id)
        .bind(cufe)
        .execute(pool)
        .await?;
    Ok(())
}

/// Record the outcome of a vendor call.
pub async fn resolve(
    pool: &PgPool,
    id: Uuid,
    status: SubmissionStatus,
    hka_response_id: Option<Uuid>,
    cufe: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE invoice_submissions
         SET status = $2,
             hka_response_id = COALESCE($3, hka_response_id),
             cufe = COALESCE($4, cufe)
         WHERE id = $1",
    )
    .bind(id)
    .bind(status.as_str())
    .bind(hka_response_id)
    .bind(cufe)
    .execute(pool)
    .await?;
    Ok(())
}

/// Return a finished submission to `pending` ahead of a retry.
pub async fn reset_to_pending(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE invoice_submissions SET status = 'pending' WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub struct ListParams {
    pub status: Option<SubmissionStatus>,
    pub config_id: Option<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list(
    pool: &PgPool,
    params: &ListParams,
) -> Result<Vec<InvoiceSubmission>, sqlx::Error> {
    sqlx::query_as::<_, InvoiceSubmission>(
        "SELECT * FROM invoice_submissions
         WHERE ($1::text IS NULL OR status = $1)
           AND ($2::uuid IS NULL OR config_id = $2)
         ORDER BY submission_date DESC, id DESC
         LIMIT $3 OFFSET $4",
    )
    .bind(params.status.map(|s| s.as_str()))
    .bind(params.config_id)
    .bind(params.limit)
    .bind(params.offset)
    .fetch_all(pool)
    .await
}

pub async fn count(
    pool: &PgPool,
    status: Option<SubmissionStatus>,
    config_id: Option<Uuid>,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM invoice_submissions
         WHERE ($1::text IS NULL OR status = $1)
           AND ($2::uuid IS NULL OR config_id = $2)",
    )
    .bind(status.map(|s| s.as_str()))
    .bind(config_id)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}
