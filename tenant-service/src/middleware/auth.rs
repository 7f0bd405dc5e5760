use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use service_core::error::AppError;

use crate::{
    services::{Claims, TenantContext},
    AppState,
};

/// Bearer token from the `Authorization` header, if well formed.
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn missing_credentials() -> AppError {
    AppError::Unauthorized(anyhow::anyhow!(
        "Missing or invalid Authorization header"
    ))
}

/// Extractor for routes owned by a tenant admin.
pub struct TenantAdmin(pub TenantContext);

#[axum::async_trait]
impl FromRequestParts<AppState> for TenantAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(missing_credentials)?;
        let context = state.resolver.resolve_tenant_admin(token).await?;
        Ok(TenantAdmin(context))
    }
}

/// Extractor for superadmin-only routes.
pub struct Superadmin(pub Claims);

#[axum::async_trait]
impl FromRequestParts<AppState> for Superadmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(missing_credentials)?;
        let claims = state.resolver.resolve_superadmin(token)?;
        Ok(Superadmin(claims))
    }
}
