use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Configuration;

/// Column values for inserting or replacing a configuration. Secrets are
/// already encrypted.
pub struct ConfigurationFields<'a> {
    pub company_name: &'a str,
    pub company_ruc: &'a str,
    pub webhook_identifier: &'a str,
    pub demo_user: Option<&'a str>,
    pub demo_password_enc: Option<&'a [u8]>,
    pub demo_api_key_enc: Option<&'a [u8]>,
    pub prod_user: Option<&'a str>,
    pub prod_password_enc: Option<&'a [u8]>,
    pub prod_api_key_enc: Option<&'a [u8]>,
}

pub async fn list(pool: &PgPool) -> Result<Vec<Configuration>, sqlx::Error> {
    sqlx::query_as::<_, Configuration>("SELECT * FROM configurations ORDER BY company_name ASC")
        .fetch_all(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Configuration>, sqlx::Error> {
    sqlx::query_as::<_, Configuration>("SELECT * FROM configurations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Webhook routing lookup.
pub async fn find_by_identifier(
    pool: &PgPool,
    identifier: &str,
) -> Result<Option<Configuration>, sqlx::Error> {
    sqlx::query_as::<_, Configuration>(
        "SELECT * FROM configurations WHERE webhook_identifier = $1",
    )
    .bind(identifier)
    .fetch_optional(pool)
    .await
}

pub async fn create(
    pool: &PgPool,
    fields: &ConfigurationFields<'_>,
) -> Result<Configuration, sqlx::Error> {
    sqlx::query_as::<_, Configuration>(
        "INSERT INTO configurations (id, company_name, company_ruc, webhook_identifier,
            demo_user, demo_password_enc, demo_api_key_enc,
            prod_user, prod_password_enc, prod_api_key_enc)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(fields.company_name)
    .bind(fields.company_ruc)
    .bind(fields.webhook_identifier)
    .bind(fields.demo_user)
    .bind(fields.demo_password_enc)
    .bind(fields.demo_api_key_enc)
    .bind(fields.prod_user)
    .bind(fields.prod_password_enc)
    .bind(fields.prod_api_key_enc)
    .fetch_one(pool)
    .await
}

/// Replace a configuration. Secrets passed as `None` keep their stored value.
pub async fn update(
    pool: &PgPool,
    id: Uuid,
    fields: &ConfigurationFields<'_>,
) -> Result<Option<Configuration>, sqlx::Error> {
    sqlx::query_as::<_, Configuration>(
        "UPDATE configurations SET
            company_name = $2,
            company_ruc = $3,
            webhook_identifier = $4,
            demo_user = $5,
            demo_password_enc = COALESCE($6, demo_password_enc),
            demo_api_key_enc = COALESCE($7, demo_api_key_enc),
            prod_user = $8,
            prod_password_enc = COALESCE($9, prod_password_enc),
            prod_api_key_enc = COALESCE($10, prod_api_key_enc),
            updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(fields.company_name)
    .bind(fields.company_ruc)
    .bind(fields.webhook_identifier)
    .bind(fields.demo_user)
    .bind(fields.demo_password_enc)
    .bind(fields.demo_api_key_enc)
    .bind(fields.prod_user)
    .bind(fields.prod_password_enc)
    .bind(fields.prod_api_key_enc)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM configurations WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
