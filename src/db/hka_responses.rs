use sqlx::PgPool;
use uuid::Uuid;

use crate::models::HkaResponseRecord;

pub async fn create(
    pool: &PgPool,
    invoice_submission_id: Uuid,
    status_code: i32,
    response_body: &serde_json::Value,
) -> Result<HkaResponseRecord, sqlx::Error> {
    sqlx::query_as::<_, HkaResponseRecord>(
        "INSERT INTO hka_responses (id, status_code, response_body, invoice_submission_id)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(status_code)
    .bind(response_body)
    .bind(invoice_submission_id)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<HkaResponseRecord>, sqlx::Error> {
    sqlx::query_as::<_, HkaResponseRecord>("SELECT * FROM hka_responses WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_by_submission(
    pool: &PgPool,
    invoice_submission_id: Uuid,
) -> Result<Vec<HkaResponseRecord>, sqlx::Error> {
    sqlx::query_as::<_, HkaResponseRecord>(
        "SELECT * FROM hka_responses WHERE invoice_submission_id = $1
         ORDER BY response_date DESC, id DESC",
    )
    .bind(invoice_submission_id)
    .fetch_all(pool)
    .await
}
