mod admin;
mod registry;

pub use admin::AdminRecord;
pub use registry::{storage_unit_id_for, RegistryEntry, RegistryEntryView, STORAGE_UNIT_PREFIX};
