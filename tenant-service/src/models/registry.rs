use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

pub const STORAGE_UNIT_PREFIX: &str = "org_";

/// Storage unit naming convention: `org_<normalized name>`.
pub fn storage_unit_id_for(organization_name: &str) -> String {
    format!("{}{}", STORAGE_UNIT_PREFIX, organization_name)
}

/// One tenant's row in the master registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryEntry {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub organization_name: String,
    pub storage_unit_id: String,
    pub admin_id: ObjectId,
    pub admin_email: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl RegistryEntry {
    pub fn new(organization_name: String, admin_id: ObjectId, admin_email: String) -> Self {
        Self {
            id: None,
            storage_unit_id: storage_unit_id_for(&organization_name),
            organization_name,
            admin_id,
            admin_email,
            created_at: Utc::now(),
        }
    }
}

/// Registry entry with identity keys rendered as strings for transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryEntryView {
    pub id: Option<String>,
    pub organization_name: String,
    pub storage_unit_id: String,
    pub admin_id: String,
    pub admin_email: String,
    pub created_at: DateTime<Utc>,
}

impl From<RegistryEntry> for RegistryEntryView {
    fn from(entry: RegistryEntry) -> Self {
        Self {
            id: entry.id.map(|id| id.to_hex()),
            organization_name: entry.organization_name,
            storage_unit_id: entry.storage_unit_id,
            admin_id: entry.admin_id.to_hex(),
            admin_email: entry.admin_email,
            created_at: entry.created_at,
        }
    }
}
