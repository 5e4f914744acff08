use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hka::Environment;

/// Per-client HKA credentials. Secrets are stored encrypted and never
/// serialized.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub id: Uuid,
    pub company_name: String,
    pub company_ruc: String,
    pub webhook_identifier: String,
    pub demo_user: Option<String>,
    #[serde(skip)]
    pub demo_password_enc: Option<Vec<u8>>,
    #[serde(skip)]
    pub demo_api_key_enc: Option<Vec<u8>>,
    pub prod_user: Option<String>,
    #[serde(skip)]
    pub prod_password_enc: Option<Vec<u8>>,
    #[serde(skip)]
    pub prod_api_key_enc: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Encrypted secrets for one environment.
pub struct EnvironmentSecrets<'a> {
    pub user: Option<&'a str>,
    pub password_enc: Option<&'a [u8]>,
    pub api_key_enc: Option<&'a [u8]>,
}

impl Configuration {
    pub fn secrets(&self, env: Environment) -> EnvironmentSecrets<'_> {
        match env {
            Environment::Demo => EnvironmentSecrets {
                user: self.demo_user.as_deref(),
                password_enc: self.demo_password_enc.as_deref(),
                api_key_enc: self.demo_api_key_enc.as_deref(),
            },
            Environment::Prod => EnvironmentSecrets {
                user: self.prod_user.as_deref(),
                password_enc: self.prod_password_enc.as_deref(),
                api_key_enc: self.prod_api_key_enc.as_deref(),
            },
        }
    }

    /// Summary of which secrets are present, for API responses.
    pub fn summary(&self) -> serde_json::Value {
        let env_summary = |env: Environment| {
            let s = self.secrets(env);
            serde_json::json!({
                "user": s.user,
                "hasPassword": s.password_enc.is_some(),
                "hasApiKey": s.api_key_enc.is_some(),
            })
        };

        serde_json::json!({
            "id": self.id,
            "companyName": self.company_name,
            "companyRuc": self.company_ruc,
            "webhookIdentifier": self.webhook_identifier,
            "demo": env_summary(Environment::Demo),
            "prod": env_summary(Environment::Prod),
            "createdAt": self.created_at,
            "updatedAt": self.updated_at,
        })
    }
}
