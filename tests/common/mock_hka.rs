//! In-process stand-in for the HKA vendor, serving both the REST and the SOAP
//! flavours of the API.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Json;
use serde_json::{Value, json};

use factubic::config::{HkaEndpoints, HkaSettings, StaticCredentials};
use factubic::hka::TransportKind;
use factubic::hka::retry::RetryPolicy;

pub const USER: &str = "usuario";
pub const PASSWORD: &str = "clave";
pub const API_KEY: &str = "api-key";

pub struct MockState {
    pub auth_calls: AtomicUsize,
    pub enviar_calls: AtomicUsize,
    pub estado_calls: AtomicUsize,
    pub anular_calls: AtomicUsize,
    pub folios_calls: AtomicUsize,
    /// HTTP status `Enviar` answers with; 200 means normal processing.
    pub enviar_status: Mutex<u16>,
    /// Vendor `codigo` inside a 200 `Enviar` reply.
    pub enviar_codigo: Mutex<String>,
    pub estado: Mutex<String>,
    pub folios: AtomicI64,
    pub last_document: Mutex<Option<String>>,
    issued: AtomicUsize,
    revoked: Mutex<HashSet<String>>,
    issued_tokens: Mutex<Vec<String>>,
}

impl MockState {
    fn new() -> Self {
        Self {
            auth_calls: AtomicUsize::new(0),
            enviar_calls: AtomicUsize::new(0),
            estado_calls: AtomicUsize::new(0),
            anular_calls: AtomicUsize::new(0),
            folios_calls: AtomicUsize::new(0),
            enviar_status: Mutex::new(200),
            enviar_codigo: Mutex::new("200".to_string()),
            estado: Mutex::new("ACEPTADO".to_string()),
            folios: AtomicI64::new(42),
            last_document: Mutex::new(None),
            issued: AtomicUsize::new(0),
            revoked: Mutex::new(HashSet::new()),
            issued_tokens: Mutex::new(Vec::new()),
        }
    }

    fn issue_token(&self, prefix: &str) -> String {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("{prefix}-{n}");
        self.issued_tokens.lock().unwrap().push(token.clone());
        token
    }

    fn token_ok(&self, token: &str) -> bool {
        self.issued_tokens.lock().unwrap().iter().any(|t| t == token)
            && !self.revoked.lock().unwrap().contains(token)
    }

    pub fn set_enviar_status(&self, status: u16) {
        *self.enviar_status.lock().unwrap() = status;
    }

    pub fn set_enviar_codigo(&self, codigo: &str) {
        *self.enviar_codigo.lock().unwrap() = codigo.to_string();
    }

    pub fn set_estado(&self, estado: &str) {
        *self.estado.lock().unwrap() = estado.to_string();
    }

    /// Expire every token handed out so far.
    pub fn revoke_all(&self) {
        let issued = self.issued_tokens.lock().unwrap().clone();
        self.revoked.lock().unwrap().extend(issued);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub struct MockHka {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockHka {
    pub fn endpoints(&self, env: &str) -> HkaEndpoints {
        HkaEndpoints {
            rest_url: format!("http://{}/rest/{env}", self.addr),
            soap_url: format!("http://{}/soap/{env}", self.addr),
        }
    }

    /// Settings pointing at this mock, with static demo credentials and
    /// millisecond retry delays.
    pub fn settings(&self, transport: TransportKind) -> HkaSettings {
        HkaSettings {
            transport,
            demo: self.endpoints("demo"),
            prod: self.endpoints("prod"),
            demo_credentials: StaticCredentials {
                user: Some(USER.to_string()),
                password: Some(PASSWORD.to_string()),
                api_key: Some(API_KEY.to_string()),
            },
            prod_credentials: StaticCredentials::default(),
            token_ttl: Duration::from_secs(540),
            retry: RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
            },
            timeout: Duration::from_secs(5),
        }
    }
}

pub async fn spawn_mock_hka() -> MockHka {
    let state = Arc::new(MockState::new());

    let app = Router::new()
        .route("/rest/{env}/Autenticacion", post(rest_auth))
        .route("/rest/{env}/Enviar", post(rest_enviar))
        .route("/rest/{env}/EstadoDocumento", post(rest_estado))
        .route("/rest/{env}/AnulacionDocumento", post(rest_anular))
        .route("/rest/{env}/FoliosRestantes", post(rest_folios))
        .route("/soap/{env}", post(soap))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock HKA");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Mock HKA failed");
    });

    MockHka { addr, state }
}

type Shared = Arc<MockState>;

fn rest_guard(state: &MockState, headers: &HeaderMap) -> Result<(), Response> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();
    if !state.token_ok(token) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "codigo": "401", "mensaje": "Token expirado" })),
        )
            .into_response());
    }
    if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "codigo": "403", "mensaje": "API key inválida" })),
        )
            .into_response());
    }
    Ok(())
}

async fn rest_auth(
    State(state): State<Shared>,
    Path(_env): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    state.auth_calls.fetch_add(1, Ordering::SeqCst);
    if body["usuario"] == USER && body["clave"] == PASSWORD {
        Json(json!({ "token": state.issue_token("rest") })).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "codigo": "401", "mensaje": "Credenciales inválidas" })),
        )
            .into_response()
    }
}

async fn rest_enviar(
    State(state): State<Shared>,
    Path(_env): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(resp) = rest_guard(&state, &headers) {
        return resp;
    }
    let n = state.enviar_calls.fetch_add(1, Ordering::SeqCst) + 1;
    *state.last_document.lock().unwrap() = Some(body["documento"].to_string());

    let status = *state.enviar_status.lock().unwrap();
    if status != 200 {
        let status = StatusCode::from_u16(status).unwrap();
        return (status, Json(json!({ "mensaje": "Servicio no disponible" }))).into_response();
    }

    let codigo = state.enviar_codigo.lock().unwrap().clone();
    if codigo != "200" {
        return Json(json!({ "codigo": codigo, "mensaje": "Documento inválido" })).into_response();
    }

    Json(json!({
        "codigo": "200",
        "resultado": "procesado",
        "mensaje": "Documento procesado",
        "cufe": format!("FE-{n}"),
        "qr": format!("https://dgi.example/qr/FE-{n}"),
    }))
    .into_response()
}

async fn rest_estado(
    State(state): State<Shared>,
    Path(_env): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(resp) = rest_guard(&state, &headers) {
        return resp;
    }
    state.estado_calls.fetch_add(1, Ordering::SeqCst);
    if body["cufe"] == "FE-MISSING" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "codigo": "404", "mensaje": "Documento no encontrado" })),
        )
            .into_response();
    }
    let estado = state.estado.lock().unwrap().clone();
    Json(json!({ "codigo": "200", "estado": estado, "mensaje": "Consulta exitosa" }))
        .into_response()
}

async fn rest_anular(
    State(state): State<Shared>,
    Path(_env): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(resp) = rest_guard(&state, &headers) {
        return resp;
    }
    state.anular_calls.fetch_add(1, Ordering::SeqCst);
    if body["cufe"] == "FE-LOCKED" {
        return Json(json!({ "codigo": "201", "mensaje": "Plazo de anulación vencido" }))
            .into_response();
    }
    Json(json!({ "codigo": "200", "mensaje": "Documento anulado" })).into_response()
}

async fn rest_folios(
    State(state): State<Shared>,
    Path(_env): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = rest_guard(&state, &headers) {
        return resp;
    }
    state.folios_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "codigo": "200", "foliosDisponibles": state.folios.load(Ordering::SeqCst) }))
        .into_response()
}

fn soap_reply(action: &str, inner: &str) -> Response {
    let xml = format!(
        "<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\"><s:Body>\
         <{action}Response xmlns=\"http://tempuri.org/\"><{action}Result>{inner}</{action}Result>\
         </{action}Response></s:Body></s:Envelope>"
    );
    (StatusCode::OK, [("content-type", "text/xml")], xml).into_response()
}

fn soap_fault(message: &str) -> Response {
    let xml = format!(
        "<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\"><s:Body><s:Fault>\
         <faultcode>s:Client</faultcode><faultstring>{message}</faultstring></s:Fault></s:Body></s:Envelope>"
    );
    (StatusCode::INTERNAL_SERVER_ERROR, [("content-type", "text/xml")], xml).into_response()
}

fn tem_param(body: &str, name: &str) -> String {
    let open = format!("<tem:{name}>");
    let close = format!("</tem:{name}>");
    body.find(&open)
        .and_then(|start| {
            let rest = &body[start + open.len()..];
            rest.find(&close).map(|end| rest[..end].to_string())
        })
        .unwrap_or_default()
}

async fn soap(
    State(state): State<Shared>,
    Path(_env): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let action = headers
        .get("soapaction")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .trim_matches('"')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();

    if action == "Autenticar" {
        state.auth_calls.fetch_add(1, Ordering::SeqCst);
        if tem_param(&body, "usuario") == USER && tem_param(&body, "clave") == PASSWORD {
            let token = state.issue_token("soap");
            return soap_reply(&action, &format!("<codigo>200</codigo><token>{token}</token>"));
        }
        return soap_reply(&action, "<codigo>401</codigo><mensaje>Credenciales inválidas</mensaje>");
    }

    if !state.token_ok(&tem_param(&body, "token")) {
        return soap_fault("Token expirado");
    }

    match action.as_str() {
        "Enviar" => {
            let n = state.enviar_calls.fetch_add(1, Ordering::SeqCst) + 1;
            *state.last_document.lock().unwrap() = Some(tem_param(&body, "documento"));
            let status = *state.enviar_status.lock().unwrap();
            if status != 200 {
                return (StatusCode::from_u16(status).unwrap(), "Service Unavailable")
                    .into_response();
            }
            soap_reply(
                &action,
                &format!("<codigo>200</codigo><mensaje>Documento procesado</mensaje><cufe>FE-SOAP-{n}</cufe>"),
            )
        }
        "EstadoDocumento" => {
            state.estado_calls.fetch_add(1, Ordering::SeqCst);
            if tem_param(&body, "cufe") == "FE-MISSING" {
                return (StatusCode::NOT_FOUND, "Not Found").into_response();
            }
            let estado = state.estado.lock().unwrap().clone();
            soap_reply(&action, &format!("<codigo>200</codigo><estado>{estado}</estado>"))
        }
        "AnulacionDocumento" => {
            state.anular_calls.fetch_add(1, Ordering::SeqCst);
            soap_reply(&action, "<codigo>200</codigo><mensaje>Documento anulado</mensaje>")
        }
        "FoliosRestantes" => {
            state.folios_calls.fetch_add(1, Ordering::SeqCst);
            let folios = state.folios.load(Ordering::SeqCst);
            soap_reply(&action, &format!("<codigo>200</codigo><foliosDisponibles>{folios}</foliosDisponibles>"))
        }
        _ => soap_fault("Acción desconocida"),
    }
}
