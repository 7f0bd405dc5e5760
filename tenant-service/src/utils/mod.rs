mod naming;
mod password;
mod validation;

pub use naming::normalize_org_name;
pub use password::{hash_password, verify_password, Password, PasswordHashString};
pub use validation::ValidatedJson;
