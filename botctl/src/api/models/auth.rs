use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_second_factor: Option<bool>,
}

impl LoginResponse {
    pub fn failure(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            temp_token: None,
            require_second_factor: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SecondFactorRequest {
    pub email: String,
    pub temp_token: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SecondFactorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl SecondFactorResponse {
    pub fn failure(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            access_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub success: bool,
    pub message: String,
}

/// Enrollment data for authenticator apps: the provisioning URI plus the
/// raw seed for manual entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SecondFactorSetupResponse {
    pub otpauth_url: String,
    pub secret: String,
}
