//! Tenant lifecycle, identity and access services.
//!
//! Every service receives the store handle at construction; none of them
//! reach for global connection state.

pub mod access;
mod admin;
mod auth;
pub mod backup;
pub mod error;
pub mod jwt;
mod memory;
pub mod metrics;
pub mod registry;
pub mod store;
pub mod tenant;

pub use access::{AccessResolver, TenantContext};
pub use admin::AdminService;
pub use auth::AuthService;
pub use backup::{BackupArtifact, BackupService, BackupSink, LocalBackupSink, MemoryBackupSink};
pub use error::ServiceError;
pub use jwt::{Claims, TokenService};
pub use memory::MemoryStore;
pub use registry::{RegistryKey, RegistryStore};
pub use store::{DocumentStore, MongoStore, UnitCollection};
pub use tenant::{
    CreatedOrganization, DeletedOrganization, OrganizationUpdate, RenamedOrganization,
    TenantManager,
};
