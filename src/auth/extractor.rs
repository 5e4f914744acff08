use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::state::SharedState;

/// Guard for the management and HKA routes.
///
/// When `FACTUBIC_ADMIN_TOKEN` is configured the request must carry it as a
/// bearer token; otherwise every request is let through.
#[derive(Debug, Clone, Copy)]
pub struct AdminAuth;

impl FromRequestParts<SharedState> for AdminAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.admin_token.as_deref() else {
            return Ok(AdminAuth);
        };

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthorized("Missing authentication token".to_string()))?;

        if bool::from(bearer.token().as_bytes().ct_eq(expected.as_bytes())) {
            Ok(AdminAuth)
        } else {
            Err(AppError::Unauthorized("Invalid authentication token".to_string()))
        }
    }
}
