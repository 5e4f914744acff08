use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::db;
use crate::error::AppError;
use crate::models::SubmissionSource;
use crate::state::SharedState;
use crate::submission::{payload, pipeline};

#[derive(Deserialize)]
pub struct WebhookBody {
    pub invoice: Option<Value>,
    pub environment: Option<String>,
}

pub async fn receive(
    State(state): State<SharedState>,
    Path(identifier): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let body: WebhookBody = if body.is_empty() {
        WebhookBody {
            invoice: None,
            environment: None,
        }
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON: {e}")))?
    };

    if !payload::is_present(body.invoice.as_ref()) {
        return Err(AppError::BadRequest(
            "El campo invoice es requerido.".to_string(),
        ));
    }

    let config = db::configurations::find_by_identifier(&state.pool, &identifier)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("No configuration for webhook identifier '{identifier}'"))
        })?;

    let environment =
        super::parse_environment(body.environment.as_deref(), state.config.default_environment)?;

    let result = pipeline::run(
        &state,
        pipeline::SubmissionRequest {
            config_id: Some(config.id),
            environment,
            invoice: body.invoice.unwrap_or(Value::Null),
            source: SubmissionSource::Webhook,
        },
    )
    .await?;

    Ok(Json(json!({
        "status": result.submission.status,
        "submissionId": result.submission.id,
        "uuid": result.submission.cufe,
        "message": result.stamp.as_ref().map(|s| s.message.as_str()),
        "duplicate": result.duplicate,
    })))
}
