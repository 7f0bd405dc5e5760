//! Organization routes for the tenant admin that owns them. Creation is the
//! only unauthenticated one.

use axum::{extract::State, http::StatusCode, Json};
use service_core::error::AppError;

use crate::dtos::org::{
    CreateOrgRequest, CreateOrgResponse, DeleteOrgResponse, OrgDetailsResponse, UpdateOrgRequest,
    UpdateOrgResponse,
};
use crate::middleware::TenantAdmin;
use crate::utils::{Password, ValidatedJson};
use crate::AppState;

pub async fn create_org(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateOrgRequest>,
) -> Result<(StatusCode, Json<CreateOrgResponse>), AppError> {
    let created = state
        .tenants
        .create(
            &req.organization_name,
            &req.admin_email,
            &Password::new(req.admin_password),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateOrgResponse {
            organization: created.organization,
            storage_unit_id: created.storage_unit_id,
            admin_id: created.admin_id,
        }),
    ))
}

pub async fn get_org(TenantAdmin(ctx): TenantAdmin) -> Json<OrgDetailsResponse> {
    Json(OrgDetailsResponse {
        organization_name: ctx.entry.organization_name,
        admin_email: ctx.entry.admin_email,
        created_at: ctx.entry.created_at,
    })
}

pub async fn update_org(
    State(state): State<AppState>,
    TenantAdmin(ctx): TenantAdmin,
    ValidatedJson(req): ValidatedJson<UpdateOrgRequest>,
) -> Result<Json<UpdateOrgResponse>, AppError> {
    let update = state
        .tenants
        .update(
            &ctx.entry.organization_name,
            req.new_organization_name.as_deref(),
            req.new_admin_email.as_deref(),
        )
        .await?;

    Ok(Json(UpdateOrgResponse {
        updated: update.updated,
        organization: update.updated.then_some(update.organization),
        backup_location: update.backup_location,
    }))
}

pub async fn delete_org(
    State(state): State<AppState>,
    TenantAdmin(ctx): TenantAdmin,
) -> Result<Json<DeleteOrgResponse>, AppError> {
    let deleted = state.tenants.delete(&ctx.entry.organization_name).await?;
    Ok(Json(DeleteOrgResponse {
        deleted: true,
        backup_location: deleted.backup.location,
    }))
}
