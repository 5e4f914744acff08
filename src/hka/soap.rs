use async_trait::async_trait;
use serde_json::{Value, json};

use crate::config::HkaEndpoints;

use super::xml::{self, SOAP_NAMESPACE};
use super::{
    CancelResult, DocumentState, DocumentStatus, Environment, HkaCredentials, HkaError,
    HkaTransport, StampResult, TransportKind,
};

/// SOAP 1.1 transport. Calls are made once; there is no retry on this path.
pub struct SoapTransport {
    client: reqwest::Client,
    demo: HkaEndpoints,
    prod: HkaEndpoints,
}

impl SoapTransport {
    pub fn new(client: reqwest::Client, demo: HkaEndpoints, prod: HkaEndpoints) -> Self {
        Self { client, demo, prod }
    }

    fn url(&self, env: Environment) -> &str {
        match env {
            Environment::Demo => &self.demo.soap_url,
            Environment::Prod => &self.prod.soap_url,
        }
    }

    async fn call(
        &self,
        env: Environment,
        action: &str,
        params: &[(&str, String)],
    ) -> Result<String, HkaError> {
        let envelope = xml::envelope(action, params);

        let resp = self
            .client
            .post(self.url(env))
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", format!("\"{SOAP_NAMESPACE}IService/{action}\""))
            .body(envelope)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;

        if let Some(fault) = xml::fault(&text) {
            // Expired or unknown tokens surface as faults, not HTTP 401.
            let status = if fault.to_lowercase().contains("token") {
                401
            } else if (200..300).contains(&status) {
                422
            } else {
                status
            };
            return Err(HkaError::vendor(status, fault, json!({ "raw": text })));
        }

        if !(200..300).contains(&status) {
            return Err(HkaError::vendor(
                status,
                format!("HKA {action} returned HTTP {status}"),
                json!({ "raw": text }),
            ));
        }

        Ok(text)
    }

    fn token_params(token: &str) -> (&'static str, String) {
        ("token", xml::escape(token))
    }
}

#[async_trait]
impl HkaTransport for SoapTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Soap
    }

    async fn authenticate(&self, creds: &HkaCredentials) -> Result<String, HkaError> {
        let reply = self
            .call(
                creds.environment,
                "Autenticar",
                &[
                    ("usuario", xml::escape(&creds.user)),
                    ("clave", xml::escape(&creds.password)),
                ],
            )
            .await?;

        xml::element_text(&reply, "token")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                let message = xml::element_text(&reply, "mensaje")
                    .unwrap_or_else(|| "HKA authentication returned no token".to_string());
                HkaError::new(401, message).with_body(reply_json(&reply))
            })
    }

    async fn send_document(
        &self,
        token: &str,
        creds: &HkaCredentials,
        payload: &Value,
    ) -> Result<StampResult, HkaError> {
        let reply = self
            .call(
                creds.environment,
                "Enviar",
                &[
                    Self::token_params(token),
                    ("documento", xml::json_to_xml("documento", payload)),
                ],
            )
            .await?;
        ensure_accepted(&reply, "Documento rechazado por HKA")?;

        let uuid = xml::element_text(&reply, "cufe")
            .ok_or_else(|| HkaError::rejected("HKA response carried no CUFE", reply_json(&reply)))?;

        Ok(StampResult {
            uuid,
            qr: xml::element_text(&reply, "qr"),
            message: xml::element_text(&reply, "mensaje")
                .unwrap_or_else(|| "Documento procesado".to_string()),
            raw: reply_json(&reply),
        })
    }

    async fn document_status(
        &self,
        token: &str,
        creds: &HkaCredentials,
        document_id: &str,
    ) -> Result<DocumentStatus, HkaError> {
        let reply = match self
            .call(
                creds.environment,
                "EstadoDocumento",
                &[Self::token_params(token), ("cufe", xml::escape(document_id))],
            )
            .await
        {
            Ok(reply) => reply,
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

        let vendor_status = xml::element_text(&reply, "estado").unwrap_or_default();
        Ok(DocumentStatus {
            status: DocumentState::from_vendor(&vendor_status),
            vendor_status,
            message: xml::element_text(&reply, "mensaje"),
            raw: reply_json(&reply),
        })
    }

    async fn cancel_document(
        &self,
        token: &str,
        creds: &HkaCredentials,
        document_id: &str,
        reason: &str,
    ) -> Result<CancelResult, HkaError> {
        let reply = self
            .call(
                creds.environment,
                "AnulacionDocumento",
                &[
                    Self::token_params(token),
                    ("cufe", xml::escape(document_id)),
                    ("motivoAnulacion", xml::escape(reason)),
                ],
            )
            .await?;
        ensure_accepted(&reply, "Anulación rechazada por HKA")?;

        Ok(CancelResult {
            message: xml::element_text(&reply, "mensaje")
                .unwrap_or_else(|| "Documento anulado".to_string()),
            raw: reply_json(&reply),
        })
    }

    async fn remaining_folios(
        &self,
        token: &str,
        creds: &HkaCredentials,
    ) -> Result<i64, HkaError> {
        let reply = self
            .call(
                creds.environment,
                "FoliosRestantes",
                &[Self::token_params(token)],
            )
            .await?;

        xml::element_text(&reply, "foliosDisponibles")
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                HkaError::transport("HKA folios response carried no count")
                    .with_body(reply_json(&reply))
            })
    }
}

fn reply_json(reply: &str) -> Value {
    json!({ "raw": reply })
}

fn ensure_accepted(reply: &str, fallback: &str) -> Result<(), HkaError> {
    match xml::element_text(reply, "codigo") {
        Some(code) if code != "200" => {
            let message = xml::element_text(reply, "mensaje").unwrap_or_else(|| fallback.to_string());
            Err(HkaError::rejected(message, reply_json(reply)))
        }
        _ => Ok(()),
    }
}
