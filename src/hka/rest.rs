use async_trait::async_trait;
use serde_json::{Value, json};

use crate::config::HkaEndpoints;

use super::retry::RetryPolicy;
use super::{
    CancelResult, DocumentState, DocumentStatus, Environment, HkaCredentials, HkaError,
    HkaTransport, StampResult, TransportKind,
};

/// JSON transport. Every call is retried on network failures and 5xx.
pub struct RestTransport {
    client: reqwest::Client,
    demo: HkaEndpoints,
    prod: HkaEndpoints,
    retry: RetryPolicy,
}

impl RestTransport {
    pub fn new(
        client: reqwest::Client,
        demo: HkaEndpoints,
        prod: HkaEndpoints,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            demo,
            prod,
            retry,
        }
    }

    fn url(&self, env: Environment, path: &str) -> String {
        let base = match env {
            Environment::Demo => &self.demo.rest_url,
            Environment::Prod => &self.prod.rest_url,
        };
        format!("{}/{path}", base.trim_end_matches('/'))
    }

    async fn post(
        &self,
        operation: &str,
        creds: &HkaCredentials,
        token: Option<&str>,
        body: &Value,
    ) -> Result<Value, HkaError> {
        let url = self.url(creds.environment, operation);
        let url = url.as_str();
        let client = &self.client;
        let api_key = creds.api_key.as_deref();

        self.retry
            .run(operation, move || async move {
                let mut req = client.post(url).json(body);
                if let Some(token) = token {
                    req = req.bearer_auth(token);
                }
                if let Some(key) = api_key {
                    req = req.header("x-api-key", key);
                }

                let resp = req.send().await?;
                let status = resp.status().as_u16();
                let text = resp.text().await?;
                let body: Value =
                    serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text }));

                if !(200..300).contains(&status) {
                    let message = vendor_message(&body)
                        .unwrap_or_else(|| format!("HKA {operation} returned HTTP {status}"));
                    return Err(HkaError::vendor(status, message, body));
                }

                Ok(body)
            })
            .await
    }
}

#[async_trait]
impl HkaTransport for RestTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Rest
    }

    async fn authenticate(&self, creds: &HkaCredentials) -> Result<String, HkaError> {
        let body = json!({ "usuario": creds.user, "clave": creds.password });
        let resp = self.post("Autenticacion", creds, None, &body).await?;

        ["token", "Token", "access_token"]
            .iter()
            .find_map(|k| resp.get(*k).and_then(|v| v.as_str()))
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .ok_or_else(|| {
                let message = vendor_message(&resp)
                    .unwrap_or_else(|| "HKA authentication returned no token".to_string());
                HkaError::new(401, message).with_body(resp)
            })
    }

    async fn send_document(
        &self,
        token: &str,
        creds: &HkaCredentials,
        payload: &Value,
    ) -> Result<StampResult, HkaError> {
        let body = json!({ "documento": payload });
        let resp = self.post("Enviar", creds, Some(token), &body).await?;
        ensure_accepted(&resp, "Documento rechazado por HKA")?;

        let uuid = ["cufe", "uuid", "CUFE"]
            .iter()
            .find_map(|k| resp.get(*k).and_then(|v| v.as_str()))
            .map(|s| s.to_string())
            .ok_or_else(|| HkaError::rejected("HKA response carried no CUFE", resp.clone()))?;

        Ok(StampResult {
            uuid,
            qr: resp.get("qr").and_then(|v| v.as_str()).map(|s| s.to_string()),
            message: vendor_message(&resp).unwrap_or_else(|| "Documento procesado".to_string()),
            raw: resp,
        })
    }

    async fn document_status(
        &self,
        token: &str,
        creds: &HkaCredentials,
        document_id: &str,
    ) -> Result<DocumentStatus, HkaError> {
        let body = json!({ "cufe": document_id });
        let resp = match self.post("EstadoDocumento", creds, Some(token), &body).await {
            Ok(resp) => resp,
            Err(e) if e.status == 404 => {
                return Ok(DocumentStatus {
                    status: DocumentState::NotFound,
                    vendor_status: "NOT_FOUND".to_string(),
                    message: Some(e.message),
                    raw: e.body.unwrap_or(Value::Null),
                });
            }
            Err(e) => return Err(e),
        };

        let vendor_status = resp
            .get("estado")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(DocumentStatus {
            status: DocumentState::from_vendor(&vendor_status),
            vendor_status,
            message: vendor_message(&resp),
            raw: resp,
        })
    }

    async fn cancel_document(
        &self,
        token: &str,
        creds: &HkaCredentials,
        document_id: &str,
        reason: &str,
    ) -> Result<CancelResult, HkaError> {
        let body = json!({ "cufe": document_id, "motivoAnulacion": reason });
        let resp = self
            .post("AnulacionDocumento", creds, Some(token), &body)
            .await?;
        ensure_accepted(&resp, "Anulación rechazada por HKA")?;

        Ok(CancelResult {
            message: vendor_message(&resp).unwrap_or_else(|| "Documento anulado".to_string()),
            raw: resp,
        })
    }

    async fn remaining_folios(
        &self,
        token: &str,
        creds: &HkaCredentials,
    ) -> Result<i64, HkaError> {
        let resp = self
            .post("FoliosRestantes", creds, Some(token), &json!({}))
            .await?;

        ["foliosDisponibles", "folios", "foliosRestantes"]
            .iter()
            .find_map(|k| resp.get(*k).and_then(as_i64))
            .ok_or_else(|| {
                HkaError::transport("HKA folios response carried no count").with_body(resp)
            })
    }
}

/// Vendor result code, which arrives as either a string or a number.
fn vendor_code(body: &Value) -> Option<String> {
    match body.get("codigo")? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn vendor_message(body: &Value) -> Option<String> {
    ["mensaje", "message", "resultado"]
        .iter()
        .find_map(|k| body.get(*k).and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}

fn ensure_accepted(body: &Value, fallback: &str) -> Result<(), HkaError> {
    match vendor_code(body) {
        Some(code) if code != "200" => {
            let message = vendor_message(body).unwrap_or_else(|| fallback.to_string());
            Err(HkaError::rejected(message, body.clone()))
        }
        _ => Ok(()),
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
