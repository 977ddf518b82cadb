use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentAdmin, CurrentUser};
use crate::api::pagination::{Envelope, Page};
use crate::api::validation::{validate_password_len, validate_username};
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::{is_foreign_key_violation, is_unique_violation};
use crate::repositories;
use crate::schemas::user::{
    AdminUserCreate, AdminUserUpdate, ProfileUpdate, UserListQuery, UserResponse,
};
use crate::services::storage::purge_blobs;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me).patch(update_me))
        .route("/", get(list_users).post(create_user))
        .route("/:user_id", get(get_user).patch(update_user).delete(delete_user))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<Envelope<UserResponse>> {
    Json(Envelope::data(UserResponse::from_db(user)))
}

fn hash_optional_password(password: Option<&str>) -> Result<Option<String>, ApiError> {
    let Some(password) = password else {
        return Ok(None);
    };
    validate_password_len(password)?;
    security::hash_password(password)
        .map(Some)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))
}

fn profile_fields(
    profile: ProfileUpdate,
    hashed_password: Option<String>,
) -> repositories::users::UpdateUser {
    repositories::users::UpdateUser {
        full_name: profile.full_name.map(|name| name.trim().to_string()),
        email: profile.email,
        phone: profile.phone,
        parent_phone: profile.parent_phone,
        school: profile.school,
        grade: profile.grade,
        hashed_password,
        ..Default::default()
    }
}

/// Role and consent flags are not accepted here; `ProfileUpdate` has no such fields.
async fn update_me(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Json<Envelope<UserResponse>>, ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    let hashed_password = hash_optional_password(payload.password.as_deref())?;

    let updated = repositories::users::update(
        state.db(),
        &user.id,
        profile_fields(payload, hashed_password),
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update profile"))?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(Envelope::with_message("Profile updated", UserResponse::from_db(updated))))
}

async fn list_users(
    Query(params): Query<UserListQuery>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<UserResponse>>>, ApiError> {
    let page = Page::new(params.page, params.limit);
    let filter = repositories::users::ListUsers {
        role: params.role,
        search: params.search.filter(|value| !value.trim().is_empty()),
    };

    let users = repositories::users::list(state.db(), &filter, page.skip(), page.limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list users"))?;
    let total = repositories::users::count(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count users"))?;

    let items = users.into_iter().map(UserResponse::from_db).collect();
    Ok(Json(Envelope::page(items, page, total)))
}

async fn create_user(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<AdminUserCreate>,
) -> Result<(StatusCode, Json<Envelope<UserResponse>>), ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    validate_username(&payload.username)?;
    validate_password_len(&payload.password)?;

    let existing = repositories::users::exists_by_username(state.db(), &payload.username)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing user"))?;
    if existing {
        return Err(ApiError::Conflict("Username is already taken".to_string()));
    }

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    let user = repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            username: &payload.username,
            hashed_password,
            full_name: payload.full_name.trim(),
            email: payload.email.as_deref(),
            phone: payload.phone.as_deref(),
            parent_phone: payload.parent_phone.as_deref(),
            school: payload.school.as_deref(),
            grade: payload.grade.as_deref(),
            role: payload.role,
            privacy_consent: payload.privacy_consent,
            marketing_consent: payload.marketing_consent,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("Username is already taken".to_string())
        } else {
            ApiError::internal(e, "Failed to create user")
        }
    })?;

    tracing::info!(
        admin_id = %admin.id,
        user_id = %user.id,
        role = payload.role.as_str(),
        action = "user_create",
        "Admin created user"
    );

    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_message("User created", UserResponse::from_db(user))),
    ))
}

async fn get_user(
    Path(user_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<UserResponse>>, ApiError> {
    let user = repositories::users::find_by_id(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(Envelope::data(UserResponse::from_db(user))))
}

async fn update_user(
    Path(user_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<AdminUserUpdate>,
) -> Result<Json<Envelope<UserResponse>>, ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    let hashed_password = hash_optional_password(payload.profile.password.as_deref())?;

    let params = repositories::users::UpdateUser {
        role: payload.role,
        privacy_consent: payload.privacy_consent,
        marketing_consent: payload.marketing_consent,
        is_active: payload.is_active,
        ..profile_fields(payload.profile, hashed_password)
    };

    let updated = repositories::users::update(state.db(), &user_id, params, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(
        admin_id = %admin.id,
        user_id = %updated.id,
        action = "user_update",
        "Admin updated user"
    );

    Ok(Json(Envelope::with_message("User updated", UserResponse::from_db(updated))))
}

async fn delete_user(
    Path(user_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<()>>, ApiError> {
    if user_id == admin.id {
        return Err(ApiError::BadRequest("Admins cannot delete their own account".to_string()));
    }

    let image_keys = repositories::submissions::image_keys_for_student(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to collect submission images"))?;

    let deleted = repositories::users::delete(state.db(), &user_id).await.map_err(|e| {
        if is_foreign_key_violation(&e) {
            ApiError::Conflict("User still owns courses; reassign them first".to_string())
        } else {
            ApiError::internal(e, "Failed to delete user")
        }
    })?;
    if !deleted {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    let failed = match state.blobs() {
        Some(store) => purge_blobs(Arc::clone(store), image_keys, "user_delete").await,
        None => 0,
    };

    tracing::info!(
        admin_id = %admin.id,
        user_id = %user_id,
        blob_failures = failed,
        action = "user_delete",
        "Admin deleted user"
    );

    Ok(Json(Envelope::message("User deleted")))
}
