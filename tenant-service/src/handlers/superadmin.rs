use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use crate::dtos::admin::MasterListResponse;
use crate::dtos::org::{DeleteOrgResponse, UpdateOrgRequest, UpdateOrgResponse};
use crate::middleware::Superadmin;
use crate::utils::ValidatedJson;
use crate::AppState;

pub async fn master_list(
    State(state): State<AppState>,
    Superadmin(claims): Superadmin,
) -> Result<Json<MasterListResponse>, AppError> {
    let organizations = state.admin.list_organizations(&claims).await?;
    Ok(Json(MasterListResponse { organizations }))
}

pub async fn update_org_by_name(
    State(state): State<AppState>,
    Superadmin(claims): Superadmin,
    Path(name): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateOrgRequest>,
) -> Result<Json<UpdateOrgResponse>, AppError> {
    let update = state
        .admin
        .update_organization(
            &claims,
            &name,
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

pub async fn delete_org_by_name(
    State(state): State<AppState>,
    Superadmin(claims): Superadmin,
    Path(name): Path<String>,
) -> Result<Json<DeleteOrgResponse>, AppError> {
    let deleted = state.admin.delete_organization(&claims, &name).await?;
    Ok(Json(DeleteOrgResponse {
        deleted: true,
        backup_location: deleted.backup.location,
    }))
}
