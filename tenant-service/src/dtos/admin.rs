use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::RegistryEntryView;

#[derive(Debug, Deserialize, Validate)]
pub struct SuperLoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MasterListResponse {
    pub organizations: Vec<RegistryEntryView>,
}
