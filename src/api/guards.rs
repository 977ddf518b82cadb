use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::security::{self, Claims};
use crate::core::state::AppState;
use crate::db::models::{Course, User};
use crate::db::types::UserRole;
use crate::repositories;
use crate::services::access_policy::{effective_role, role_allows, Capability};

/// Active user resolved from the bearer token.
pub(crate) struct CurrentUser(pub(crate) User);

/// `CurrentUser` whose role is admin.
pub(crate) struct CurrentAdmin(pub(crate) User);

/// Identity taken from the signed token claims alone, without a database lookup.
#[derive(Debug, Clone)]
pub(crate) struct TokenIdentity {
    pub(crate) user_id: String,
    pub(crate) role: UserRole,
}

impl CurrentUser {
    pub(crate) fn role(&self) -> UserRole {
        effective_role(self.0.role)
    }

    pub(crate) fn allows(&self, capability: Capability) -> bool {
        role_allows(self.role(), capability)
    }

    pub(crate) fn require(&self, capability: Capability) -> Result<(), ApiError> {
        if self.allows(capability) {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Not enough permissions"))
        }
    }
}

fn bearer_claims(parts: &Parts, state: &AppState) -> Result<Claims, ApiError> {
    let token = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

    security::verify_token(token, state.settings())
        .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))
}

async fn app_state(parts: &mut Parts, state: &AppState) -> Result<AppState, ApiError> {
    let State(app_state) = State::<AppState>::from_request_parts(parts, state)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;
    Ok(app_state)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let app_state = app_state(parts, state).await?;
        let claims = bearer_claims(parts, &app_state)?;

        let user = repositories::users::find_by_id(app_state.db(), &claims.sub)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

        let Some(user) = user else {
            return Err(ApiError::Unauthorized("User not found"));
        };

        if !user.is_active {
            return Err(ApiError::Unauthorized("Invalid authentication credentials"));
        }

        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;

        if current.allows(Capability::ManageUsers) {
            Ok(CurrentAdmin(current.0))
        } else {
            Err(ApiError::Forbidden("Admin access required"))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for TokenIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let app_state = app_state(parts, state).await?;
        let claims = bearer_claims(parts, &app_state)?;

        Ok(TokenIdentity { user_id: claims.sub, role: effective_role(claims.role) })
    }
}

pub(crate) async fn load_course(state: &AppState, course_id: &str) -> Result<Course, ApiError> {
    repositories::courses::find_by_id(state.db(), course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch course"))?
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))
}

/// Admins manage every course, teachers only the ones they own.
pub(crate) fn ensure_course_manager(
    user_id: &str,
    role: UserRole,
    course: &Course,
) -> Result<(), ApiError> {
    if role_allows(role, Capability::ManageAnyCourse) {
        return Ok(());
    }
    if role_allows(role, Capability::ManageOwnCourses) && course.teacher_id == user_id {
        return Ok(());
    }
    Err(ApiError::Forbidden("You do not manage this course"))
}

/// Managers plus enrolled students.
pub(crate) async fn ensure_course_member(
    state: &AppState,
    user_id: &str,
    role: UserRole,
    course: &Course,
) -> Result<(), ApiError> {
    if ensure_course_manager(user_id, role, course).is_ok() {
        return Ok(());
    }

    let enrolled = repositories::courses::is_enrolled(state.db(), &course.id, user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check enrollment"))?;

    if enrolled {
        Ok(())
    } else {
        Err(ApiError::Forbidden("You are not a member of this course"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn course(teacher_id: &str) -> Course {
        Course {
            id: "c1".to_string(),
            name: "중1 A반".to_string(),
            description: None,
            teacher_id: teacher_id.to_string(),
            created_at: datetime!(2025-01-01 00:00),
            updated_at: datetime!(2025-01-01 00:00),
        }
    }

    #[test]
    fn only_owner_or_admin_manages_course() {
        let course = course("t1");
        assert!(ensure_course_manager("t1", UserRole::Teacher, &course).is_ok());
        assert!(ensure_course_manager("t2", UserRole::Teacher, &course).is_err());
        assert!(ensure_course_manager("a1", UserRole::Admin, &course).is_ok());
        assert!(ensure_course_manager("t1", UserRole::Student, &course).is_err());
    }
}
