use sqlx::PgPool;
use uuid::Uuid;

use crate::config::StaticCredentials;
use crate::crypto::CredentialCipher;
use crate::db;
use crate::error::AppError;
use crate::models::Configuration;

use super::{Environment, HkaCredentials, HkaError, TransportKind};

/// Resolve credentials for a request: from the stored configuration when a
/// `config_id` is given, otherwise from the static environment variables.
pub async fn resolve(
    pool: &PgPool,
    settings: &crate::config::Config,
    transport: TransportKind,
    config_id: Option<Uuid>,
    env: Environment,
) -> Result<HkaCredentials, AppError> {
    match config_id {
        Some(id) => {
            let config = db::configurations::find_by_id(pool, id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Configuration {id} not found")))?;
            Ok(from_configuration(
                &config,
                env,
                transport,
                &settings.encryption_key,
            )?)
        }
        None => Ok(from_static(
            settings.hka.static_credentials(env),
            env,
            transport,
        )?),
    }
}

pub fn from_configuration(
    config: &Configuration,
    env: Environment,
    transport: TransportKind,
    encryption_key: &str,
) -> Result<HkaCredentials, HkaError> {
    let incomplete = || {
        HkaError::config(format!(
            "HKA configuration '{}' is incomplete for the '{env}' environment",
            config.id
        ))
    };

    let cipher = CredentialCipher::new(encryption_key);
    let secrets = config.secrets(env);
    let user = secrets
        .user
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(incomplete)?;
    let password_enc = secrets.password_enc.ok_or_else(incomplete)?;
    let password = cipher.open(password_enc).map_err(|e| {
        HkaError::config(format!("Failed to decrypt HKA password for '{env}': {e}"))
    })?;

    let api_key = secrets
        .api_key_enc
        .map(|enc| cipher.open(enc))
        .transpose()
        .map_err(|e| HkaError::config(format!("Failed to decrypt HKA API key for '{env}': {e}")))?;

    if transport == TransportKind::Rest && api_key.is_none() {
        return Err(incomplete());
    }

    Ok(HkaCredentials {
        environment: env,
        user: user.to_string(),
        password,
        api_key,
    })
}

pub fn from_static(
    creds: &StaticCredentials,
    env: Environment,
    transport: TransportKind,
) -> Result<HkaCredentials, HkaError> {
    let incomplete = || {
        HkaError::config(format!(
            "Static HKA credentials are incomplete for the '{env}' environment"
        ))
    };

    let user = creds.user.clone().ok_or_else(incomplete)?;
    let password = creds.password.clone().ok_or_else(incomplete)?;
    if transport == TransportKind::Rest && creds.api_key.is_none() {
        return Err(incomplete());
    }

    Ok(HkaCredentials {
        environment: env,
        user,
        password,
        api_key: creds.api_key.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_credentials_require_api_key_for_rest() {
        let creds = StaticCredentials {
            user: Some("u".to_string()),
            password: Some("p".to_string()),
            api_key: None,
        };

        let err = from_static(&creds, Environment::Demo, TransportKind::Rest).unwrap_err();
        assert_eq!(err.status, 500);
        assert!(err.message.contains("incomplete for the 'demo' environment"));

        let soap = from_static(&creds, Environment::Demo, TransportKind::Soap).unwrap();
        assert_eq!(soap.user, "u");
        assert!(soap.api_key.is_none());
    }
}
