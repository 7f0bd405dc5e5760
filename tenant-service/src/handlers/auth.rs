use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::dtos::admin::SuperLoginRequest;
use crate::dtos::org::{LoginRequest, LoginResponse};
use crate::utils::{Password, ValidatedJson};
use crate::AppState;

pub async fn admin_login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let token = state
        .auth
        .login(&req.email, &Password::new(req.password))
        .await?;
    Ok(Json(LoginResponse::bearer(token)))
}

pub async fn super_login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SuperLoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let token = state
        .auth
        .superadmin_login(&req.username, &Password::new(req.password))?;
    Ok(Json(LoginResponse::bearer(token)))
}
