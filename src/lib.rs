pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod hka;
pub mod models;
pub mod routes;
pub mod state;
pub mod submission;
pub mod token_cache;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::{Config, HkaSettings};
use crate::hka::rest::RestTransport;
use crate::hka::soap::SoapTransport;
use crate::hka::{HkaClient, HkaTransport, TransportKind};
use crate::state::{AppState, SharedState};
use crate::token_cache::TokenCache;

/// Build the HKA client for the configured transport, sharing `tokens`.
pub fn build_hka_client(settings: &HkaSettings, tokens: Arc<TokenCache>) -> HkaClient {
    let http = reqwest::Client::builder()
        .timeout(settings.timeout)
        .build()
        .expect("Failed to build reqwest client");

    let transport: Arc<dyn HkaTransport> = match settings.transport {
        TransportKind::Rest => Arc::new(RestTransport::new(
            http,
            settings.demo.clone(),
            settings.prod.clone(),
            settings.retry,
        )),
        TransportKind::Soap => Arc::new(SoapTransport::new(
            http,
            settings.demo.clone(),
            settings.prod.clone(),
        )),
    };

    HkaClient::new(transport, tokens)
}

pub fn build_app(pool: PgPool, config: Config) -> (Router, SharedState) {
    let tokens = Arc::new(TokenCache::new(config.hka.token_ttl));
    let hka = build_hka_client(&config.hka, tokens.clone());

    tracing::info!(
        "HKA transport: {:?}, default environment: {}",
        config.hka.transport,
        config.default_environment
    );
    if config.admin_token.is_none() {
        tracing::warn!("FACTUBIC_ADMIN_TOKEN not set, management API is unauthenticated");
    }

    let max_body_size = config.max_body_size;
    let state: SharedState = Arc::new(AppState {
        pool,
        config,
        hka,
        tokens,
    });

    let app = Router::new()
        .merge(routes::api_routes())
        .merge(routes::webhook_routes())
        .route("/health", axum::routing::get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(max_body_size))
                .layer(SetResponseHeaderLayer::overriding(
                    HeaderName::from_static("x-content-type-options"),
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    HeaderName::from_static("cache-control"),
                    HeaderValue::from_static("no-store"),
                )),
        )
        .with_state(state.clone());

    (app, state)
}

async fn health() -> &'static str {
    "ok"
}
