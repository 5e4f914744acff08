use std::net::IpAddr;
use std::time::Duration;

use crate::hka::retry::RetryPolicy;
use crate::hka::{Environment, TransportKind};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub encryption_key: String,
    pub host: IpAddr,
    pub port: u16,
    pub max_body_size: usize,
    pub admin_token: Option<String>,
    pub default_environment: Environment,
    pub log_level: String,
    pub hka: HkaSettings,
}

#[derive(Debug, Clone)]
pub struct HkaSettings {
    pub transport: TransportKind,
    pub demo: HkaEndpoints,
    pub prod: HkaEndpoints,
    pub demo_credentials: StaticCredentials,
    pub prod_credentials: StaticCredentials,
    pub token_ttl: Duration,
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

impl HkaSettings {
    pub fn static_credentials(&self, env: Environment) -> &StaticCredentials {
        match env {
            Environment::Demo => &self.demo_credentials,
            Environment::Prod => &self.prod_credentials,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HkaEndpoints {
    pub rest_url: String,
    pub soap_url: String,
}

/// Fallback credentials used when a request carries no configuration id.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    pub user: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let encryption_key = env_required("FACTUBIC_ENCRYPTION_KEY")?;

        let host: IpAddr = env_or("FACTUBIC_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid FACTUBIC_HOST: {e}"))?;

        let port: u16 = env_or("FACTUBIC_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid FACTUBIC_PORT: {e}"))?;

        let max_body_size: usize = env_or("FACTUBIC_MAX_BODY_SIZE", "1048576")
            .parse()
            .map_err(|e| format!("Invalid FACTUBIC_MAX_BODY_SIZE: {e}"))?;

        let admin_token = env_optional("FACTUBIC_ADMIN_TOKEN");

        let default_environment: Environment = env_or("FACTUBIC_DEFAULT_ENVIRONMENT", "demo")
            .parse()
            .map_err(|e| format!("Invalid FACTUBIC_DEFAULT_ENVIRONMENT: {e}"))?;

        let log_level = env_or("FACTUBIC_LOG_LEVEL", "info");

        let transport: TransportKind = env_or("HKA_TRANSPORT", "rest")
            .parse()
            .map_err(|e| format!("Invalid HKA_TRANSPORT: {e}"))?;

        let demo = HkaEndpoints {
            rest_url: env_or(
                "HKA_REST_URL_DEMO",
                "https://demointegracion.thefactoryhka.com.pa/api",
            ),
            soap_url: env_or(
                "HKA_SOAP_URL_DEMO",
                "https://demoemision.thefactoryhka.com.pa/ws/obj/v1.0/Service.svc",
            ),
        };

        let prod = HkaEndpoints {
            rest_url: env_or(
                "HKA_REST_URL_PROD",
                "https://integracion.thefactoryhka.com.pa/api",
            ),
            soap_url: env_or(
                "HKA_SOAP_URL_PROD",
                "https://emision.thefactoryhka.com.pa/ws/obj/v1.0/Service.svc",
            ),
        };

        let token_ttl_secs: u64 = env_or("HKA_TOKEN_TTL_SECS", "540")
            .parse()
            .map_err(|e| format!("Invalid HKA_TOKEN_TTL_SECS: {e}"))?;

        let max_retries: u32 = env_or("HKA_MAX_RETRIES", "2")
            .parse()
            .map_err(|e| format!("Invalid HKA_MAX_RETRIES: {e}"))?;

        let retry_base_ms: u64 = env_or("HKA_RETRY_BASE_MS", "500")
            .parse()
            .map_err(|e| format!("Invalid HKA_RETRY_BASE_MS: {e}"))?;

        let timeout_secs: u64 = env_or("HKA_TIMEOUT_SECS", "30")
            .parse()
            .map_err(|e| format!("Invalid HKA_TIMEOUT_SECS: {e}"))?;

        let hka = HkaSettings {
            transport,
            demo,
            prod,
            demo_credentials: static_credentials("DEMO"),
            prod_credentials: static_credentials("PROD"),
            token_ttl: Duration::from_secs(token_ttl_secs),
            retry: RetryPolicy {
                max_retries,
                base_delay: Duration::from_millis(retry_base_ms),
            },
            timeout: Duration::from_secs(timeout_secs),
        };

        Ok(Config {
            database_url,
            encryption_key,
            host,
            port,
            max_body_size,
            admin_token,
            default_environment,
            log_level,
            hka,
        })
    }
}

fn static_credentials(suffix: &str) -> StaticCredentials {
    StaticCredentials {
        user: env_optional(&format!("HKA_USER_{suffix}")),
        password: env_optional(&format!("HKA_PASSWORD_{suffix}")),
        api_key: env_optional(&format!("HKA_API_KEY_{suffix}")),
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
