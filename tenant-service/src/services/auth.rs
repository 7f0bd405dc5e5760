use mongodb::bson::{self, doc};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::jwt::{org_admin_claims, superadmin_claims, TokenService};
use super::registry::RegistryStore;
use super::store::DocumentStore;
use super::ServiceError;
use crate::config::SuperadminConfig;
use crate::models::AdminRecord;
use crate::utils::{verify_password, Password, PasswordHashString};

/// Credential checks that end in a freshly issued token.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn DocumentStore>,
    registry: RegistryStore,
    tokens: TokenService,
    superadmin: SuperadminConfig,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        registry: RegistryStore,
        tokens: TokenService,
        superadmin: SuperadminConfig,
    ) -> Self {
        Self {
            store,
            registry,
            tokens,
            superadmin,
        }
    }

    /// Tenant-admin login. Unknown email, missing admin record and wrong
    /// password all come back as the same `InvalidCredentials`.
    pub async fn login(&self, email: &str, password: &Password) -> Result<String, ServiceError> {
        let Some(entry) = self.registry.find_by_admin_email(email).await? else {
            tracing::debug!("Login for unregistered admin email");
            return Err(ServiceError::InvalidCredentials);
        };

        let Some(found) = self
            .store
            .collection(&entry.storage_unit_id)
            .find_one(doc! { "email": email })
            .await?
        else {
            tracing::warn!(
                organization = %entry.organization_name,
                "Registry references an admin with no record in its storage unit"
            );
            return Err(ServiceError::InvalidCredentials);
        };
        let admin: AdminRecord = bson::from_document(found)?;

        if !verify_password(password, &PasswordHashString::new(admin.password_hash)) {
            return Err(ServiceError::InvalidCredentials);
        }

        let admin_id = admin.id.map(|id| id.to_hex()).unwrap_or_default();
        let token = self.tokens.issue(
            &admin_id,
            org_admin_claims(&admin_id, &entry.organization_name, &entry.admin_email),
            None,
        )?;

        tracing::info!(organization = %entry.organization_name, "Admin logged in");
        Ok(token)
    }

    pub fn superadmin_login(
        &self,
        username: &str,
        password: &Password,
    ) -> Result<String, ServiceError> {
        if self.superadmin.password.is_empty() {
            tracing::warn!("Superadmin login attempted but no password is configured");
            return Err(ServiceError::InvalidCredentials);
        }

        let username_ok = username
            .as_bytes()
            .ct_eq(self.superadmin.username.as_bytes());
        let password_ok = password
            .as_str()
            .as_bytes()
            .ct_eq(self.superadmin.password.as_bytes());

        if !bool::from(username_ok & password_ok) {
            tracing::warn!("Superadmin login rejected");
            return Err(ServiceError::InvalidCredentials);
        }

        let token = self
            .tokens
            .issue(username, superadmin_claims(username), None)?;
        tracing::info!("Superadmin logged in");
        Ok(token)
    }
}
