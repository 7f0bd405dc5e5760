//! Tenant lifecycle: create, rename (copy-verify-swap), delete and admin email
//! changes over per-tenant storage units.
//!
//! Nothing here takes a lock. Concurrent mutations of the same tenant race
//! on the registry's unique indexes, and the loser gets `Conflict`.

use futures::StreamExt;
use mongodb::bson::{self, doc};
use std::sync::Arc;

use super::backup::{BackupArtifact, BackupService};
use super::registry::RegistryStore;
use super::store::{DocumentStore, UnitCollection};
use super::ServiceError;
use crate::config::DEFAULT_COPY_BATCH_SIZE;
use crate::models::{storage_unit_id_for, AdminRecord, RegistryEntry};
use crate::utils::{hash_password, normalize_org_name, Password};

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedOrganization {
    pub organization: String,
    pub storage_unit_id: String,
    pub admin_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenamedOrganization {
    pub entry: RegistryEntry,
    pub backup: BackupArtifact,
    pub copied: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeletedOrganization {
    pub organization: String,
    pub backup: BackupArtifact,
}

/// Result of applying an optional rename and an optional email change.
#[derive(Debug, Clone, PartialEq)]
pub struct OrganizationUpdate {
    pub updated: bool,
    pub organization: String,
    pub backup_location: Option<String>,
}

fn record_outcome<T>(operation: &'static str, result: &Result<T, ServiceError>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(ServiceError::Conflict(_)) => "conflict",
        Err(ServiceError::NotFound(_)) => "not_found",
        Err(ServiceError::Migration { .. }) => "migration_failed",
        Err(_) => "error",
    };
    metrics::counter!(
        "tenant_lifecycle_operations_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

#[derive(Clone)]
pub struct TenantManager {
    store: Arc<dyn DocumentStore>,
    registry: RegistryStore,
    backups: BackupService,
    copy_batch_size: usize,
}

impl TenantManager {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        registry: RegistryStore,
        backups: BackupService,
    ) -> Self {
        Self {
            store,
            registry,
            backups,
            copy_batch_size: DEFAULT_COPY_BATCH_SIZE,
        }
    }

    pub fn with_copy_batch_size(mut self, copy_batch_size: usize) -> Self {
        self.copy_batch_size = copy_batch_size.max(1);
        self
    }

    pub fn registry(&self) -> &RegistryStore {
        &self.registry
    }

    fn unit(&self, unit_id: &str) -> Arc<dyn UnitCollection> {
        self.store.collection(unit_id)
    }

    async fn require(&self, name: &str) -> Result<RegistryEntry, ServiceError> {
        self.registry
            .find_by_name(name)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Organization {} not found", name)))
    }

    /// Writes the admin record first and the registry entry second, so a
    /// failed admin insert never leaves a registry entry behind.
    #[tracing::instrument(skip(self, admin_password), fields(organization))]
    pub async fn create(
        &self,
        raw_name: &str,
        admin_email: &str,
        admin_password: &Password,
    ) -> Result<CreatedOrganization, ServiceError> {
        let result = self.create_inner(raw_name, admin_email, admin_password).await;
        record_outcome("create", &result);
        result
    }

    async fn create_inner(
        &self,
        raw_name: &str,
        admin_email: &str,
        admin_password: &Password,
    ) -> Result<CreatedOrganization, ServiceError> {
        let name = normalize_org_name(raw_name)
            .ok_or_else(|| ServiceError::Validation("organization_name is required".into()))?;
        tracing::Span::current().record("organization", name.as_str());

        if self.registry.find_by_name(&name).await?.is_some() {
            return Err(ServiceError::Conflict("Organization already exists".into()));
        }
        if self.registry.find_by_admin_email(admin_email).await?.is_some() {
            return Err(ServiceError::Conflict(
                "Admin email already used for another organization".into(),
            ));
        }

        let unit_id = storage_unit_id_for(&name);
        let unit = self.unit(&unit_id);
        if unit.count_documents(doc! {}).await? > 0 {
            return Err(ServiceError::Conflict(format!(
                "Storage unit {} already holds data",
                unit_id
            )));
        }

        let digest = hash_password(admin_password)?;
        let admin = AdminRecord::new(admin_email.to_string(), digest.into_string());
        let admin_id = unit
            .insert_one(bson::to_document(&admin)?)
            .await?
            .as_object_id()
            .ok_or_else(|| {
                ServiceError::Internal(anyhow::anyhow!("Admin identity key is not an ObjectId"))
            })?;

        let entry = RegistryEntry::new(name.clone(), admin_id, admin_email.to_string());
        if let Err(e) = self.registry.insert(&entry).await {
            // Lost a race on the unique indexes; the unit we just filled is ours.
            tracing::warn!(storage_unit = %unit_id, "Registry insert failed, removing unit: {}", e);
            unit.drop_collection().await?;
            return Err(e);
        }

        tracing::info!(storage_unit = %unit_id, admin_id = %admin_id, "Organization created");

        Ok(CreatedOrganization {
            organization: name,
            storage_unit_id: unit_id,
            admin_id: admin_id.to_hex(),
        })
    }

    /// Backup, copy into the new unit, verify counts, then swap.
    ///
    /// On a count mismatch the new unit is dropped and the source stays
    /// registered under its old name; the backup is kept and nothing retries.
    #[tracing::instrument(skip(self))]
    pub async fn rename(
        &self,
        current_name: &str,
        new_raw_name: &str,
    ) -> Result<RenamedOrganization, ServiceError> {
        let result = self.rename_inner(current_name, new_raw_name).await;
        record_outcome("rename", &result);
        result
    }

    async fn rename_inner(
        &self,
        current_name: &str,
        new_raw_name: &str,
    ) -> Result<RenamedOrganization, ServiceError> {
        let entry = self.require(current_name).await?;
        let new_name = normalize_org_name(new_raw_name)
            .ok_or_else(|| ServiceError::Validation("new_organization_name is required".into()))?;

        if new_name == entry.organization_name {
            return Err(ServiceError::Validation(
                "New organization name matches the current one".into(),
            ));
        }
        if self.registry.find_by_name(&new_name).await?.is_some() {
            return Err(ServiceError::Conflict(
                "New organization name already exists".into(),
            ));
        }

        let source_id = entry.storage_unit_id.clone();
        let dest_id = storage_unit_id_for(&new_name);
        let source = self.unit(&source_id);
        let dest = self.unit(&dest_id);

        if dest.count_documents(doc! {}).await? > 0 {
            return Err(ServiceError::Conflict(format!(
                "Storage unit {} already holds data",
                dest_id
            )));
        }

        let backup = self.backups.backup_unit(&source_id).await?;

        let migration_failed = |reason: String| ServiceError::Migration {
            unit: source_id.clone(),
            reason,
            backup_location: backup.location.clone(),
        };

        let copied = match self.copy_unit(source.as_ref(), dest.as_ref()).await {
            Ok(copied) => copied,
            Err(e) => {
                tracing::error!(storage_unit = %source_id, "Copy failed: {}", e);
                dest.drop_collection().await?;
                return Err(migration_failed(format!("copy failed: {}", e)));
            }
        };

        let source_count = source.count_documents(doc! {}).await?;
        let dest_count = dest.count_documents(doc! {}).await?;
        if source_count != dest_count {
            tracing::error!(
                storage_unit = %source_id,
                source_count,
                dest_count,
                backup_location = %backup.location,
                "Document count mismatch after copy; rolling back"
            );
            dest.drop_collection().await?;
            return Err(migration_failed(format!(
                "document count mismatch (source {}, destination {})",
                source_count, dest_count
            )));
        }

        // The copy assigned fresh identity keys; the registry must follow the
        // admin record to its new one.
        let admin_id = match dest
            .find_one(doc! { "email": entry.admin_email.as_str() })
            .await?
            .and_then(|admin| admin.get_object_id("_id").ok())
        {
            Some(id) => id,
            None => {
                tracing::error!(storage_unit = %dest_id, "Admin record missing after copy");
                dest.drop_collection().await?;
                return Err(migration_failed(
                    "admin record missing from the copied unit".to_string(),
                ));
            }
        };

        // Commit the registry before dropping the source: if a concurrent
        // writer claimed the name first, the unique index rejects this update
        // and the source is still intact.
        if let Err(e) = self
            .registry
            .update_fields(
                &entry.organization_name,
                doc! {
                    "organization_name": new_name.as_str(),
                    "storage_unit_id": dest_id.as_str(),
                    "admin_id": admin_id,
                },
            )
            .await
        {
            tracing::warn!(storage_unit = %dest_id, "Registry commit failed, dropping copy: {}", e);
            dest.drop_collection().await?;
            return Err(e);
        }

        source.drop_collection().await?;

        tracing::info!(
            from = %source_id,
            to = %dest_id,
            copied,
            backup_location = %backup.location,
            "Organization renamed"
        );

        let entry = RegistryEntry {
            organization_name: new_name,
            storage_unit_id: dest_id,
            admin_id,
            ..entry
        };

        Ok(RenamedOrganization {
            entry,
            backup,
            copied,
        })
    }

    /// Streams `source` into `dest` in batches, stripping identity keys so the
    /// destination assigns fresh ones.
    async fn copy_unit(
        &self,
        source: &dyn UnitCollection,
        dest: &dyn UnitCollection,
    ) -> Result<usize, ServiceError> {
        let mut cursor = source.find(doc! {}).await?;
        let mut batch = Vec::with_capacity(self.copy_batch_size);
        let mut copied = 0;

        while let Some(document) = cursor.next().await {
            let mut document = document?;
            document.remove("_id");
            batch.push(document);

            if batch.len() >= self.copy_batch_size {
                copied += dest.insert_many(std::mem::take(&mut batch)).await?;
            }
        }
        if !batch.is_empty() {
            copied += dest.insert_many(batch).await?;
        }

        metrics::counter!("tenant_documents_copied_total").increment(copied as u64);
        Ok(copied)
    }

    /// Backs up, drops the unit, removes the registry entry. A failed backup
    /// aborts before anything is dropped.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> Result<DeletedOrganization, ServiceError> {
        let result = self.delete_inner(name).await;
        record_outcome("delete", &result);
        result
    }

    async fn delete_inner(&self, name: &str) -> Result<DeletedOrganization, ServiceError> {
        let entry = self.require(name).await?;

        let backup = self.backups.backup_unit(&entry.storage_unit_id).await?;

        self.unit(&entry.storage_unit_id).drop_collection().await?;
        self.registry.delete(&entry.organization_name).await?;

        tracing::info!(
            storage_unit = %entry.storage_unit_id,
            backup_location = %backup.location,
            "Organization deleted"
        );

        Ok(DeletedOrganization {
            organization: entry.organization_name,
            backup,
        })
    }

    /// Moves every admin record under the old email to `new_email`, then the
    /// registry entry.
    #[tracing::instrument(skip(self))]
    pub async fn update_admin_email(
        &self,
        name: &str,
        new_email: &str,
    ) -> Result<RegistryEntry, ServiceError> {
        let result = self.update_admin_email_inner(name, new_email).await;
        record_outcome("update_admin_email", &result);
        result
    }

    async fn update_admin_email_inner(
        &self,
        name: &str,
        new_email: &str,
    ) -> Result<RegistryEntry, ServiceError> {
        let entry = self.require(name).await?;
        if entry.admin_email == new_email {
            return Ok(entry);
        }

        if let Some(owner) = self.registry.find_by_admin_email(new_email).await? {
            if owner.organization_name != entry.organization_name {
                return Err(ServiceError::Conflict(
                    "Admin email already used for another organization".into(),
                ));
            }
        }

        let updated = self
            .unit(&entry.storage_unit_id)
            .update_many(
                doc! { "email": entry.admin_email.as_str() },
                doc! { "$set": { "email": new_email } },
            )
            .await?;

        self.registry
            .update_fields(&entry.organization_name, doc! { "admin_email": new_email })
            .await?;

        tracing::info!(
            organization = %entry.organization_name,
            admin_records = updated,
            "Admin email updated"
        );

        Ok(RegistryEntry {
            admin_email: new_email.to_string(),
            ..entry
        })
    }

    /// Rename first (if asked), then the email change against the possibly
    /// new name. Both conflicts are checked up front so a rejected request
    /// never leaves a half-applied update behind.
    pub async fn update(
        &self,
        name: &str,
        new_name: Option<&str>,
        new_email: Option<&str>,
    ) -> Result<OrganizationUpdate, ServiceError> {
        let entry = self.require(name).await?;

        let new_name = match new_name.filter(|n| !n.trim().is_empty()) {
            Some(raw) => {
                let normalized = normalize_org_name(raw).ok_or_else(|| {
                    ServiceError::Validation("new_organization_name is required".into())
                })?;
                (normalized != entry.organization_name).then_some(normalized)
            }
            None => None,
        };
        let new_email = new_email
            .filter(|e| !e.trim().is_empty())
            .filter(|e| *e != entry.admin_email);

        if let Some(new_name) = &new_name {
            if self.registry.find_by_name(new_name).await?.is_some() {
                return Err(ServiceError::Conflict(
                    "New organization name already exists".into(),
                ));
            }
        }
        if let Some(new_email) = new_email {
            if let Some(owner) = self.registry.find_by_admin_email(new_email).await? {
                if owner.organization_name != entry.organization_name {
                    return Err(ServiceError::Conflict(
                        "Admin email already used for another organization".into(),
                    ));
                }
            }
        }

        let mut current = entry.organization_name;
        let mut backup_location = None;
        let mut updated = false;

        if let Some(new_name) = new_name {
            let renamed = self.rename(&current, &new_name).await?;
            current = renamed.entry.organization_name;
            backup_location = Some(renamed.backup.location);
            updated = true;
        }

        if let Some(new_email) = new_email {
            self.update_admin_email(&current, new_email).await?;
            updated = true;
        }

        Ok(OrganizationUpdate {
            updated,
            organization: current,
            backup_location,
        })
    }
}
