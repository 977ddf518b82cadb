use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::schemas::user::UserResponse;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegisterRequest {
    pub(crate) username: String,
    pub(crate) password: String,
    #[validate(length(min = 1, max = 100, message = "fullName must not be empty"))]
    pub(crate) full_name: String,
    #[serde(default)]
    #[validate(email(message = "email is not valid"))]
    pub(crate) email: Option<String>,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub(crate) phone: Option<String>,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub(crate) parent_phone: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub(crate) school: Option<String>,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub(crate) grade: Option<String>,
    #[serde(default)]
    pub(crate) privacy_consent: bool,
    #[serde(default)]
    pub(crate) marketing_consent: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    pub(crate) username: String,
    pub(crate) password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) token_type: String,
    pub(crate) user: UserResponse,
}
