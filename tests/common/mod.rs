#![allow(dead_code)]

pub mod mock_hka;

use std::net::SocketAddr;

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use factubic::config::Config;
use factubic::hka::{Environment, TransportKind};

use mock_hka::MockHka;

/// A running test server instance with a dedicated test database and its
/// own mock HKA vendor.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: PgPool,
    pub client: Client,
    pub db_name: String,
    pub hka: MockHka,
    pub admin_token: Option<String>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.admin_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn read(resp: reqwest::Response) -> (Value, StatusCode) {
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Create a configuration with complete demo credentials for the mock
    /// vendor, return the configuration JSON.
    pub async fn create_configuration(&self, identifier: &str) -> Value {
        let (body, status) = self
            .post(
                "/api/configurations",
                &json!({
                    "companyName": "Ubic Solutions S.A.",
                    "companyRuc": "155612345-2-2021",
                    "webhookIdentifier": identifier,
                    "demoUser": mock_hka::USER,
                    "demoPassword": mock_hka::PASSWORD,
                    "demoApiKey": mock_hka::API_KEY,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create configuration failed: {body}");
        body
    }

    /// Deliver a webhook for `identifier`, return (body, status).
    pub async fn webhook(&self, identifier: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(&format!("/api/webhooks/invoices/{identifier}")))
            .json(body)
            .send()
            .await
            .expect("webhook request failed");
        Self::read(resp).await
    }

    pub async fn get(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .authed(self.client.get(self.url(path)))
            .send()
            .await
            .expect("get request failed");
        Self::read(resp).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .authed(self.client.post(self.url(path)))
            .json(body)
            .send()
            .await
            .expect("post request failed");
        Self::read(resp).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .authed(self.client.put(self.url(path)))
            .json(body)
            .send()
            .await
            .expect("put request failed");
        Self::read(resp).await
    }

    pub async fn delete(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .authed(self.client.delete(self.url(path)))
            .send()
            .await
            .expect("delete request failed");
        Self::read(resp).await
    }
}

/// A small but realistic invoice payload.
pub fn sample_invoice(number: &str) -> Value {
    json!({
        "numeroDocumentoFiscal": number,
        "puntoFacturacionFiscal": "001",
        "fechaEmision": "2026-10-01T10:00:00-05:00",
        "cliente": {
            "tipoClienteFE": "01",
            "numeroRUC": "8-888-8888",
            "razonSocial": "Cliente de Prueba",
        },
        "listaItems": [
            { "descripcion": "Servicio de consultoría", "cantidad": 1, "precioUnitario": 100.0, "tasaITBMS": "01" }
        ],
        "totales": { "totalPrecioNeto": 100.0, "totalITBMS": 7.0, "totalFactura": 107.0 },
    })
}

/// Spawn a test app with a fresh temporary database, REST transport and no
/// admin token.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(TransportKind::Rest, None).await
}

fn base_database_url() -> String {
    let _ = dotenvy::dotenv();
    std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests")
}

/// `base` with its database name swapped for `name`.
fn database_url(base: &str, name: &str) -> String {
    base.rsplit_once('/')
        .map(|(prefix, _)| format!("{prefix}/{name}"))
        .unwrap_or_else(|| base.to_string())
}

async fn maintenance_pool() -> PgPool {
    PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url(&base_database_url(), "postgres"))
        .await
        .expect("Failed to connect to the postgres maintenance database")
}

pub async fn spawn_app_with(transport: TransportKind, admin_token: Option<&str>) -> TestApp {
    let db_name = format!("factubic_test_{}", Uuid::now_v7().simple());

    let admin_pool = maintenance_pool().await;
    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");
    admin_pool.close().await;

    let test_url = database_url(&base_database_url(), &db_name);
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations on test database");

    let hka = mock_hka::spawn_mock_hka().await;

    let config = Config {
        database_url: test_url,
        encryption_key: "test-encryption-key-32-chars-ok!".to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        max_body_size: 1_048_576,
        admin_token: admin_token.map(str::to_string),
        default_environment: Environment::Demo,
        log_level: "warn".to_string(),
        hka: hka.settings(transport),
    };

    let (app, _state) = factubic::build_app(pool.clone(), config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        pool,
        client,
        db_name,
        hka,
        admin_token: admin_token.map(str::to_string),
    }
}

/// Drop stale test databases (useful after test crashes).
pub async fn cleanup_stale_test_dbs() {
    let admin_pool = maintenance_pool().await;
    let rows = sqlx::query_scalar::<_, String>(
        "SELECT datname FROM pg_database WHERE datname LIKE 'factubic_test_%'",
    )
    .fetch_all(&admin_pool)
    .await
    .unwrap_or_default();

    for db_name in rows {
        drop_database(&admin_pool, &db_name).await;
    }
    admin_pool.close().await;
}

/// Drop the test database after tests complete.
pub async fn cleanup(app: TestApp) {
    app.pool.close().await;

    let admin_pool = maintenance_pool().await;
    drop_database(&admin_pool, &app.db_name).await;
    admin_pool.close().await;
}

async fn drop_database(admin_pool: &PgPool, db_name: &str) {
    let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
        .execute(admin_pool)
        .await;
}
