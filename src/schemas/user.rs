use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::services::access_policy::effective_role;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdminUserCreate {
    pub(crate) username: String,
    pub(crate) password: String,
    #[validate(length(min = 1, max = 100, message = "fullName must not be empty"))]
    pub(crate) full_name: String,
    #[serde(default = "default_user_role")]
    pub(crate) role: UserRole,
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
    #[serde(default = "default_true")]
    pub(crate) privacy_consent: bool,
    #[serde(default)]
    pub(crate) marketing_consent: bool,
}

/// Fields a user may change on their own profile.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProfileUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "fullName must not be empty"))]
    pub(crate) full_name: Option<String>,
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
    pub(crate) password: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdminUserUpdate {
    #[serde(flatten)]
    #[validate(nested)]
    pub(crate) profile: ProfileUpdate,
    #[serde(default)]
    pub(crate) role: Option<UserRole>,
    #[serde(default)]
    pub(crate) privacy_consent: Option<bool>,
    #[serde(default)]
    pub(crate) marketing_consent: Option<bool>,
    #[serde(default)]
    pub(crate) is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserListQuery {
    pub(crate) page: Option<i64>,
    pub(crate) limit: Option<i64>,
    pub(crate) role: Option<UserRole>,
    pub(crate) search: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) full_name: String,
    pub(crate) email: Option<String>,
    pub(crate) phone: Option<String>,
    pub(crate) parent_phone: Option<String>,
    pub(crate) school: Option<String>,
    pub(crate) grade: Option<String>,
    pub(crate) role: UserRole,
    pub(crate) privacy_consent: bool,
    pub(crate) marketing_consent: bool,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
}

impl UserResponse {
    pub(crate) fn from_db(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            email: user.email,
            phone: user.phone,
            parent_phone: user.parent_phone,
            school: user.school,
            grade: user.grade,
            role: effective_role(user.role),
            privacy_consent: user.privacy_consent,
            marketing_consent: user.marketing_consent,
            is_active: user.is_active,
            created_at: format_primitive(user.created_at),
        }
    }
}

fn default_user_role() -> UserRole {
    UserRole::Student
}

fn default_true() -> bool {
    true
}
