//! Client for The Factory HKA certification service.
//!
//! `HkaClient` owns the session handling (token cache, one re-authentication
//! on 401) and delegates the wire format to an `HkaTransport`: JSON over REST
//! or XML over SOAP.

pub mod credentials;
pub mod error;
pub mod rest;
pub mod retry;
pub mod soap;
pub mod status;
pub mod xml;

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::token_cache::{TokenCache, TokenKey};

pub use error::HkaError;
pub use status::DocumentState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Demo,
    Prod,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Demo => "demo",
            Environment::Prod => "prod",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "demo" | "pruebas" | "test" => Ok(Environment::Demo),
            "prod" | "production" | "produccion" => Ok(Environment::Prod),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Rest,
    Soap,
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rest" => Ok(TransportKind::Rest),
            "soap" => Ok(TransportKind::Soap),
            other => Err(format!("unknown transport '{other}'")),
        }
    }
}

/// Credentials for one environment of one client.
#[derive(Clone)]
pub struct HkaCredentials {
    pub environment: Environment,
    pub user: String,
    pub password: String,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for HkaCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HkaCredentials")
            .field("environment", &self.environment)
            .field("user", &self.user)
            .field("password", &"***")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StampResult {
    /// Vendor document id (CUFE).
    pub uuid: String,
    pub qr: Option<String>,
    pub message: String,
    pub raw: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStatus {
    pub status: DocumentState,
    pub vendor_status: String,
    pub message: Option<String>,
    pub raw: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResult {
    pub message: String,
    pub raw: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Validation {
    pub valid: bool,
    pub message: String,
}

/// Wire-level operations against the vendor. Implementations do not cache
/// tokens; `HkaClient` does.
#[async_trait]
pub trait HkaTransport: Send + Sync {
    fn kind(&self) -> TransportKind;

    async fn authenticate(&self, creds: &HkaCredentials) -> Result<String, HkaError>;

    async fn send_document(
        &self,
        token: &str,
        creds: &HkaCredentials,
        payload: &Value,
    ) -> Result<StampResult, HkaError>;

    async fn document_status(
        &self,
        token: &str,
        creds: &HkaCredentials,
        document_id: &str,
    ) -> Result<DocumentStatus, HkaError>;

    async fn cancel_document(
        &self,
        token: &str,
        creds: &HkaCredentials,
        document_id: &str,
        reason: &str,
    ) -> Result<CancelResult, HkaError>;

    async fn remaining_folios(&self, token: &str, creds: &HkaCredentials)
    -> Result<i64, HkaError>;
}

#[derive(Clone)]
pub struct HkaClient {
    transport: Arc<dyn HkaTransport>,
    tokens: Arc<TokenCache>,
}

impl HkaClient {
    pub fn new(transport: Arc<dyn HkaTransport>, tokens: Arc<TokenCache>) -> Self {
        Self { transport, tokens }
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    pub async fn timbrar(
        &self,
        creds: &HkaCredentials,
        payload: &Value,
    ) -> Result<StampResult, HkaError> {
        let transport = &self.transport;
        self.with_session(creds, move |token| async move {
            transport.send_document(&token, creds, payload).await
        })
        .await
    }

    pub async fn consultar_estado(
        &self,
        creds: &HkaCredentials,
        document_id: &str,
    ) -> Result<DocumentStatus, HkaError> {
        let transport = &self.transport;
        self.with_session(creds, move |token| async move {
            transport.document_status(&token, creds, document_id).await
        })
        .await
    }

    pub async fn anular(
        &self,
        creds: &HkaCredentials,
        document_id: &str,
        reason: &str,
    ) -> Result<CancelResult, HkaError> {
        let transport = &self.transport;
        self.with_session(creds, move |token| async move {
            transport
                .cancel_document(&token, creds, document_id, reason)
                .await
        })
        .await
    }

    pub async fn consultar_folios(&self, creds: &HkaCredentials) -> Result<i64, HkaError> {
        let transport = &self.transport;
        self.with_session(creds, move |token| async move {
            transport.remaining_folios(&token, creds).await
        })
        .await
    }

    /// Check credentials by authenticating with them directly, bypassing the
    /// token cache. Vendor rejections come back as `valid: false`.
    pub async fn validar(&self, creds: &HkaCredentials) -> Result<Validation, HkaError> {
        match self.transport.authenticate(creds).await {
            Ok(_) => Ok(Validation {
                valid: true,
                message: "Credenciales válidas".to_string(),
            }),
            Err(e) if e.is_rejection() => Ok(Validation {
                valid: false,
                message: e.message,
            }),
            Err(e) => Err(e),
        }
    }

    fn token_key(&self, creds: &HkaCredentials) -> TokenKey {
        TokenKey {
            transport: self.transport.kind(),
            environment: creds.environment,
            user: creds.user.clone(),
        }
    }

    async fn session(&self, creds: &HkaCredentials) -> Result<String, HkaError> {
        let key = self.token_key(creds);
        if let Some(token) = self.tokens.get(&key) {
            return Ok(token);
        }

        tracing::debug!(
            "Authenticating with HKA ({:?}, {}) as {}",
            self.transport.kind(),
            creds.environment,
            creds.user
        );
        let token = self.transport.authenticate(creds).await?;
        self.tokens.insert(key, token.clone());
        Ok(token)
    }

    /// Run `op` with a session token. A 401 drops the cached token and the
    /// operation is attempted once more with a fresh one.
    async fn with_session<T, F, Fut>(&self, creds: &HkaCredentials, op: F) -> Result<T, HkaError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, HkaError>>,
    {
        let token = self.session(creds).await?;
        match op(token).await {
            Err(e) if e.is_unauthorized() => {
                tracing::info!("HKA session for {} rejected, re-authenticating", creds.user);
                self.tokens.invalidate(&self.token_key(creds));
                let token = self.session(creds).await?;
                op(token).await
            }
            other => other,
        }
    }
}
