use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::hka::HkaClient;
use crate::token_cache::TokenCache;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub hka: HkaClient,
    pub tokens: Arc<TokenCache>,
}
