use std::sync::LazyLock;

use axum::Json;
use axum::extract::{Path, State};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::auth::extractor::AdminAuth;
use crate::crypto::CredentialCipher;
use crate::db;
use crate::db::configurations::ConfigurationFields;
use crate::error::AppError;
use crate::state::SharedState;
use crate::submission::payload::non_blank;

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]{0,99}$").unwrap());

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationRequest {
    pub company_name: String,
    pub company_ruc: String,
    pub webhook_identifier: Option<String>,
    pub demo_user: Option<String>,
    pub demo_password: Option<String>,
    pub demo_api_key: Option<String>,
    pub prod_user: Option<String>,
    pub prod_password: Option<String>,
    pub prod_api_key: Option<String>,
}

/// Encrypted secrets for a request, owned so the borrowed
/// `ConfigurationFields` can point into them.
struct SealedSecrets {
    demo_password: Option<Vec<u8>>,
    demo_api_key: Option<Vec<u8>>,
    prod_password: Option<Vec<u8>>,
    prod_api_key: Option<Vec<u8>>,
}

impl SealedSecrets {
    fn seal(req: &ConfigurationRequest, key: &str) -> Result<Self, AppError> {
        let cipher = CredentialCipher::new(key);
        let seal = |s: &Option<String>| {
            cipher.seal_optional(s.as_deref()).map_err(AppError::Internal)
        };
        Ok(Self {
            demo_password: seal(&req.demo_password)?,
            demo_api_key: seal(&req.demo_api_key)?,
            prod_password: seal(&req.prod_password)?,
            prod_api_key: seal(&req.prod_api_key)?,
        })
    }
}

pub async fn list(
    _auth: AdminAuth,
    State(state): State<SharedState>,
) -> Result<Json<Vec<Value>>, AppError> {
    let configs = db::configurations::list(&state.pool).await?;
    Ok(Json(configs.iter().map(|c| c.summary()).collect()))
}

pub async fn create(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Json(req): Json<ConfigurationRequest>,
) -> Result<Json<Value>, AppError> {
    let (company_name, company_ruc, identifier) = validate(&req)?;
    let sealed = SealedSecrets::seal(&req, &state.config.encryption_key)?;
    let fields = fields(&req, company_name, company_ruc, &identifier, &sealed);

    let config = db::configurations::create(&state.pool, &fields)
        .await
        .map_err(unique_violation)?;

    tracing::info!("Configuration {} created for {}", config.id, config.company_name);
    Ok(Json(config.summary()))
}

pub async fn get(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let config = db::configurations::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Configuration not found".to_string()))?;
    Ok(Json(config.summary()))
}

pub async fn update(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ConfigurationRequest>,
) -> Result<Json<Value>, AppError> {
    let (company_name, company_ruc, identifier) = validate(&req)?;
    let sealed = SealedSecrets::seal(&req, &state.config.encryption_key)?;
    let fields = fields(&req, company_name, company_ruc, &identifier, &sealed);

    let config = db::configurations::update(&state.pool, id, &fields)
        .await
        .map_err(unique_violation)?
        .ok_or_else(|| AppError::NotFound("Configuration not found".to_string()))?;

    tracing::info!("Configuration {} updated", config.id);
    Ok(Json(config.summary()))
}

pub async fn delete(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !db::configurations::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Configuration not found".to_string()));
    }
    tracing::info!("Configuration {id} deleted");
    Ok(Json(json!({ "message": "Deleted" })))
}

fn validate(req: &ConfigurationRequest) -> Result<(&str, &str, String), AppError> {
    let company_name = non_blank(Some(req.company_name.as_str()))
        .ok_or_else(|| AppError::BadRequest("companyName is required".to_string()))?;
    let company_ruc = non_blank(Some(req.company_ruc.as_str()))
        .ok_or_else(|| AppError::BadRequest("companyRuc is required".to_string()))?;

    let identifier = match non_blank(req.webhook_identifier.as_deref()) {
        Some(id) => id.to_string(),
        None => slugify(company_name),
    };
    validate_identifier(&identifier)?;

    Ok((company_name, company_ruc, identifier))
}

fn fields<'a>(
    req: &'a ConfigurationRequest,
    company_name: &'a str,
    company_ruc: &'a str,
    identifier: &'a str,
    sealed: &'a SealedSecrets,
) -> ConfigurationFields<'a> {
    ConfigurationFields {
        company_name,
        company_ruc,
        webhook_identifier: identifier,
        demo_user: non_blank(req.demo_user.as_deref()),
        demo_password_enc: sealed.demo_password.as_deref(),
        demo_api_key_enc: sealed.demo_api_key.as_deref(),
        prod_user: non_blank(req.prod_user.as_deref()),
        prod_password_enc: sealed.prod_password.as_deref(),
        prod_api_key_enc: sealed.prod_api_key.as_deref(),
    }
}

fn unique_violation(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(
                "A configuration with this webhook identifier already exists".to_string(),
            )
        }
        _ => AppError::Database(e),
    }
}

fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn validate_identifier(identifier: &str) -> Result<(), AppError> {
    if !IDENTIFIER_RE.is_match(identifier) {
        return Err(AppError::BadRequest(
            "webhookIdentifier must be 1-100 lowercase letters, numbers, hyphens or underscores"
                .to_string(),
        ));
    }
    Ok(())
}
