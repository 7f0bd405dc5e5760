//! Superadmin operations over the whole registry. Authorization happens at
//! the edge; the caller's claims are only used for attribution here.

use super::jwt::Claims;
use super::tenant::{DeletedOrganization, OrganizationUpdate, TenantManager};
use super::ServiceError;
use crate::models::RegistryEntryView;

#[derive(Clone)]
pub struct AdminService {
    tenants: TenantManager,
}

impl AdminService {
    pub fn new(tenants: TenantManager) -> Self {
        Self { tenants }
    }

    pub async fn list_organizations(
        &self,
        actor: &Claims,
    ) -> Result<Vec<RegistryEntryView>, ServiceError> {
        let entries = self.tenants.registry().list().await?;
        tracing::info!(actor = %actor.sub, count = entries.len(), "Listed registry");
        Ok(entries.into_iter().map(RegistryEntryView::from).collect())
    }

    pub async fn update_organization(
        &self,
        actor: &Claims,
        name: &str,
        new_name: Option<&str>,
        new_email: Option<&str>,
    ) -> Result<OrganizationUpdate, ServiceError> {
        tracing::info!(actor = %actor.sub, organization = %name, "Superadmin update");
        self.tenants.update(name, new_name, new_email).await
    }

    pub async fn delete_organization(
        &self,
        actor: &Claims,
        name: &str,
    ) -> Result<DeletedOrganization, ServiceError> {
        tracing::info!(actor = %actor.sub, organization = %name, "Superadmin delete");
        self.tenants.delete(name).await
    }
}
