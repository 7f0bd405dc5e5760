pub mod auth;
pub mod health;
pub mod org;
pub mod superadmin;

pub use auth::{admin_login, super_login};
pub use health::{health_check, metrics, readiness_check};
pub use org::{create_org, delete_org, get_org, update_org};
pub use superadmin::{delete_org_by_name, master_list, update_org_by_name};
