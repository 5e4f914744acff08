use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSubmission {
    pub id: Uuid,
    pub submission_date: DateTime<Utc>,
    pub invoice_data: serde_json::Value,
    pub status: String,
    pub hka_response_id: Option<Uuid>,
    pub source: String,
    pub config_id: Option<Uuid>,
    pub environment: String,
    pub cufe: Option<String>,
    #[serde(skip_serializing)]
    pub payload_hash: String,
}

impl InvoiceSubmission {
    pub fn status(&self) -> Option<SubmissionStatus> {
        SubmissionStatus::parse(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Certified,
    Failed,
    Error,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Certified => "certified",
            SubmissionStatus::Failed => "failed",
            SubmissionStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SubmissionStatus::Pending),
            "certified" => Some(SubmissionStatus::Certified),
            "failed" => Some(SubmissionStatus::Failed),
            "error" => Some(SubmissionStatus::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionSource {
    Manual,
    Webhook,
}

impl SubmissionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionSource::Manual => "manual",
            SubmissionSource::Webhook => "webhook",
        }
    }
}
