use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{ensure_course_manager, ensure_course_member, load_course, CurrentUser};
use crate::api::pagination::{Envelope, Page};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::is_unique_violation;
use crate::db::types::UserRole;
use crate::repositories;
use crate::repositories::courses::CourseScope;
use crate::schemas::course::{
    CourseCreate, CourseDetailResponse, CourseListQuery, CourseResponse, CourseUpdate,
    EnrollRequest,
};
use crate::services::access_policy::{effective_role, Capability};
use crate::services::storage::purge_blobs;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_courses).post(create_course))
        .route("/:course_id", get(get_course).patch(update_course).delete(delete_course))
        .route("/:course_id/students", post(enroll_student))
        .route("/:course_id/students/:student_id", delete(unenroll_student))
}

async fn list_courses(
    Query(params): Query<CourseListQuery>,
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<CourseResponse>>>, ApiError> {
    let page = Page::new(params.page, params.limit);
    let scope = match current.role() {
        UserRole::Admin => CourseScope::All,
        UserRole::Teacher => CourseScope::TaughtBy(&current.0.id),
        UserRole::Student => CourseScope::EnrolledStudent(&current.0.id),
    };

    let courses = repositories::courses::list(state.db(), scope, page.skip(), page.limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list courses"))?;
    let total = repositories::courses::count(state.db(), scope)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count courses"))?;

    let items = courses.into_iter().map(CourseResponse::from_db).collect();
    Ok(Json(Envelope::page(items, page, total)))
}

/// The referenced user must exist and hold the given role.
async fn require_user_with_role(
    state: &AppState,
    user_id: &str,
    role: UserRole,
    label: &str,
) -> Result<(), ApiError> {
    let user = repositories::users::find_by_id(state.db(), user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user"))?
        .ok_or_else(|| ApiError::NotFound(format!("{label} not found")))?;

    if effective_role(user.role) == role {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("User {user_id} is not a {}", role.as_str())))
    }
}

async fn create_course(
    current: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<CourseCreate>,
) -> Result<(StatusCode, Json<Envelope<CourseResponse>>), ApiError> {
    current.require(Capability::CreateCourse)?;
    payload.validate().map_err(ApiError::validation)?;

    let teacher_id = match (current.role(), payload.teacher_id.as_deref()) {
        (UserRole::Admin, Some(teacher_id)) => {
            require_user_with_role(&state, teacher_id, UserRole::Teacher, "Teacher").await?;
            teacher_id.to_string()
        }
        (UserRole::Admin, None) => {
            return Err(ApiError::BadRequest("teacherId is required".to_string()));
        }
        _ => current.0.id.clone(),
    };

    let course = repositories::courses::create(
        state.db(),
        repositories::courses::CreateCourse {
            id: &Uuid::new_v4().to_string(),
            name: payload.name.trim(),
            description: payload.description.as_deref(),
            teacher_id: &teacher_id,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("A course with this name already exists".to_string())
        } else {
            ApiError::internal(e, "Failed to create course")
        }
    })?;

    tracing::info!(
        user_id = %current.0.id,
        course_id = %course.id,
        teacher_id = %course.teacher_id,
        action = "course_create",
        "Course created"
    );

    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_message("Course created", CourseResponse::from_db(course))),
    ))
}

async fn get_course(
    Path(course_id): Path<String>,
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<CourseDetailResponse>>, ApiError> {
    let course = load_course(&state, &course_id).await?;
    ensure_course_member(&state, &current.0.id, current.role(), &course).await?;

    let student_ids = repositories::courses::student_ids(state.db(), &course.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list enrolled students"))?;
    let assignment_ids = repositories::assignments::ids_for_course(state.db(), &course.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list course assignments"))?;

    Ok(Json(Envelope::data(CourseDetailResponse {
        course: CourseResponse::from_db(course),
        student_ids,
        assignment_ids,
    })))
}

async fn update_course(
    Path(course_id): Path<String>,
    current: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<CourseUpdate>,
) -> Result<Json<Envelope<CourseResponse>>, ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    let course = load_course(&state, &course_id).await?;
    ensure_course_manager(&current.0.id, current.role(), &course)?;

    if let Some(teacher_id) = payload.teacher_id.as_deref() {
        if !current.allows(Capability::ManageAnyCourse) {
            return Err(ApiError::Forbidden("Only admins can reassign a course"));
        }
        require_user_with_role(&state, teacher_id, UserRole::Teacher, "Teacher").await?;
    }

    let updated = repositories::courses::update(
        state.db(),
        &course_id,
        repositories::courses::UpdateCourse {
            name: payload.name.map(|name| name.trim().to_string()),
            description: payload.description,
            teacher_id: payload.teacher_id,
        },
        primitive_now_utc(),
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("A course with this name already exists".to_string())
        } else {
            ApiError::internal(e, "Failed to update course")
        }
    })?
    .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;

    Ok(Json(Envelope::with_message("Course updated", CourseResponse::from_db(updated))))
}

async fn delete_course(
    Path(course_id): Path<String>,
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<()>>, ApiError> {
    current.require(Capability::DeleteCourse)?;

    let blob_keys = repositories::assignments::blob_keys_for_course(state.db(), &course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to collect course files"))?;

    let deleted = repositories::courses::delete(state.db(), &course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete course"))?;
    if !deleted {
        return Err(ApiError::NotFound("Course not found".to_string()));
    }

    let failed = match state.blobs() {
        Some(store) => purge_blobs(Arc::clone(store), blob_keys, "course_delete").await,
        None => 0,
    };

    tracing::info!(
        admin_id = %current.0.id,
        course_id = %course_id,
        blob_failures = failed,
        action = "course_delete",
        "Admin deleted course"
    );

    Ok(Json(Envelope::message("Course deleted")))
}

async fn enroll_student(
    Path(course_id): Path<String>,
    current: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<EnrollRequest>,
) -> Result<(StatusCode, Json<Envelope<()>>), ApiError> {
    let course = load_course(&state, &course_id).await?;
    ensure_course_manager(&current.0.id, current.role(), &course)?;
    require_user_with_role(&state, &payload.student_id, UserRole::Student, "Student").await?;

    repositories::courses::enroll(state.db(), &course.id, &payload.student_id, primitive_now_utc())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::Conflict("Student is already enrolled in this course".to_string())
            } else {
                ApiError::internal(e, "Failed to enroll student")
            }
        })?;

    tracing::info!(
        course_id = %course.id,
        student_id = %payload.student_id,
        action = "course_enroll",
        "Student enrolled"
    );

    Ok((StatusCode::CREATED, Json(Envelope::message("Student enrolled"))))
}

async fn unenroll_student(
    Path((course_id, student_id)): Path<(String, String)>,
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let course = load_course(&state, &course_id).await?;
    ensure_course_manager(&current.0.id, current.role(), &course)?;

    let removed = repositories::courses::unenroll(state.db(), &course.id, &student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to remove student"))?;

    tracing::info!(
        course_id = %course.id,
        student_id = %student_id,
        removed,
        action = "course_unenroll",
        "Student removed from course"
    );

    Ok(StatusCode::NO_CONTENT)
}
