//! Master registry: organization name ↔ storage unit ↔ admin identity.

use futures::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Document};
use std::sync::Arc;

use super::store::{DocumentStore, UnitCollection};
use super::ServiceError;
use crate::models::RegistryEntry;

pub const MASTER_COLLECTION: &str = "master_organizations";

/// Key a registry lookup can be made by.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryKey {
    OrganizationName(String),
    AdminEmail(String),
    AdminId(ObjectId),
}

impl RegistryKey {
    fn filter(&self) -> Document {
        match self {
            RegistryKey::OrganizationName(name) => doc! { "organization_name": name.as_str() },
            RegistryKey::AdminEmail(email) => doc! { "admin_email": email.as_str() },
            RegistryKey::AdminId(id) => doc! { "admin_id": *id },
        }
    }
}

#[derive(Clone)]
pub struct RegistryStore {
    master: Arc<dyn UnitCollection>,
}

impl RegistryStore {
    pub fn new(store: &dyn DocumentStore) -> Self {
        Self {
            master: store.collection(MASTER_COLLECTION),
        }
    }

    /// Unique indexes on name and admin email back the registry invariants
    /// when two writers race past the pre-checks.
    pub async fn initialize_indexes(&self) -> Result<(), ServiceError> {
        tracing::info!("Creating registry indexes");
        self.master.create_unique_index("organization_name").await?;
        self.master.create_unique_index("admin_email").await?;
        Ok(())
    }

    pub async fn find(&self, key: &RegistryKey) -> Result<Option<RegistryEntry>, ServiceError> {
        self.master
            .find_one(key.filter())
            .await?
            .map(|d| bson::from_document::<RegistryEntry>(d).map_err(ServiceError::from))
            .transpose()
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<RegistryEntry>, ServiceError> {
        self.find(&RegistryKey::OrganizationName(name.to_string()))
            .await
    }

    pub async fn find_by_admin_email(
        &self,
        email: &str,
    ) -> Result<Option<RegistryEntry>, ServiceError> {
        self.find(&RegistryKey::AdminEmail(email.to_string())).await
    }

    pub async fn insert(&self, entry: &RegistryEntry) -> Result<ObjectId, ServiceError> {
        let id = self.master.insert_one(bson::to_document(entry)?).await?;
        id.as_object_id().ok_or_else(|| {
            ServiceError::Internal(anyhow::anyhow!("Registry identity key is not an ObjectId"))
        })
    }

    /// Applies `$set: fields` to the entry currently named `name`.
    pub async fn update_fields(&self, name: &str, fields: Document) -> Result<(), ServiceError> {
        let matched = self
            .master
            .update_one(doc! { "organization_name": name }, doc! { "$set": fields })
            .await?;
        if matched == 0 {
            return Err(ServiceError::NotFound(format!(
                "Organization {} not found",
                name
            )));
        }
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<bool, ServiceError> {
        let deleted = self
            .master
            .delete_one(doc! { "organization_name": name })
            .await?;
        Ok(deleted > 0)
    }

    pub async fn list(&self) -> Result<Vec<RegistryEntry>, ServiceError> {
        self.master
            .find(doc! {})
            .await?
            .and_then(|d| async move { bson::from_document(d).map_err(ServiceError::from) })
            .try_collect()
            .await
    }
}
