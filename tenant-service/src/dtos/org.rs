use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrgRequest {
    #[validate(length(min = 1, max = 100, message = "Organization name is required"))]
    pub organization_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub admin_email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub admin_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrgResponse {
    pub organization: String,
    pub storage_unit_id: String,
    pub admin_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
}

impl LoginResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// Both fields optional; a request with neither is a no-op.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateOrgRequest {
    #[validate(length(min = 1, max = 100))]
    pub new_organization_name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub new_admin_email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateOrgResponse {
    pub updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_location: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteOrgResponse {
    pub deleted: bool,
    pub backup_location: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrgDetailsResponse {
    pub organization_name: String,
    pub admin_email: String,
    pub created_at: DateTime<Utc>,
}
