use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HkaResponseRecord {
    pub id: Uuid,
    pub response_date: DateTime<Utc>,
    pub status_code: i32,
    pub response_body: serde_json::Value,
    pub invoice_submission_id: Uuid,
}
