use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::auth::enforce_rate_limit;
use crate::api::errors::ApiError;
use crate::api::guards::{ensure_course_manager, load_course, CurrentUser, TokenIdentity};
use crate::api::pagination::{Envelope, Page};
use crate::api::validation::{validate_answer_key, validate_classification};
use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc, to_primitive_utc};
use crate::db::models::{AnswerKeyEntry, Assignment, AssignmentFile};
use crate::db::types::UserRole;
use crate::repositories;
use crate::repositories::assignments::ListAssignments;
use crate::schemas::assignment::{
    AnswerKeyReplace, AssignmentCreate, AssignmentListQuery, AssignmentResponse,
    AssignmentUpdate, PresignRequest, PresignResponse, SubmissionResponse, SubmitRequest,
    SubmitResponse,
};
use crate::services::access_policy::{role_allows, Capability};
use crate::services::grading;
use crate::services::storage::purge_blobs;
use crate::services::submission_lifecycle;

/// One submit per student and assignment inside this window.
const SUBMIT_RATE_LIMIT: u64 = 1;
const SUBMIT_RATE_WINDOW_SECONDS: u64 = 5;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_assignments).post(create_assignment))
        .route("/files/presign", post(presign_file))
        .route(
            "/:assignment_id",
            get(get_assignment).patch(update_assignment).delete(delete_assignment),
        )
        .route("/:assignment_id/answer-key", get(get_answer_key).put(replace_answer_key))
        .route("/:assignment_id/submit", post(submit_answers))
        .route("/:assignment_id/submissions", get(list_submissions))
        .route("/:assignment_id/submissions/me", get(my_submission))
}

pub(crate) async fn load_assignment(
    state: &AppState,
    assignment_id: &str,
) -> Result<Assignment, ApiError> {
    repositories::assignments::find_by_id(state.db(), assignment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch assignment"))?
        .ok_or_else(|| ApiError::NotFound("Assignment not found".to_string()))
}

/// Loads the assignment and checks that the caller manages its course.
pub(crate) async fn load_managed_assignment(
    state: &AppState,
    current: &CurrentUser,
    assignment_id: &str,
) -> Result<Assignment, ApiError> {
    let assignment = load_assignment(state, assignment_id).await?;
    let course = load_course(state, &assignment.course_id).await?;
    ensure_course_manager(&current.0.id, current.role(), &course)?;
    Ok(assignment)
}

fn ensure_due_after_open(
    open_at: time::PrimitiveDateTime,
    due_at: time::PrimitiveDateTime,
) -> Result<(), ApiError> {
    if due_at < open_at {
        return Err(ApiError::BadRequest("dueAt must not be before openAt".to_string()));
    }
    Ok(())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

async fn list_assignments(
    Query(params): Query<AssignmentListQuery>,
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<AssignmentResponse>>>, ApiError> {
    let page = Page::new(params.page, params.limit);
    let role = current.role();
    let mut filter = ListAssignments {
        course_id: params.course_id,
        assignment_type: params.assignment_type,
        ..Default::default()
    };
    match role {
        UserRole::Admin => {}
        UserRole::Teacher => filter.teacher_id = Some(current.0.id.clone()),
        UserRole::Student => filter.enrolled_student = Some(current.0.id.clone()),
    }

    let assignments =
        repositories::assignments::list(state.db(), &filter, page.skip(), page.limit)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list assignments"))?;
    let total = repositories::assignments::count(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count assignments"))?;

    let include_key = role_allows(role, Capability::ViewAnswerKey);
    let items = assignments
        .into_iter()
        .map(|assignment| AssignmentResponse::from_db(assignment, include_key))
        .collect();
    Ok(Json(Envelope::page(items, page, total)))
}

async fn create_assignment(
    current: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<AssignmentCreate>,
) -> Result<(StatusCode, Json<Envelope<AssignmentResponse>>), ApiError> {
    payload.validate().map_err(ApiError::validation)?;

    let course = load_course(&state, &payload.course_id).await?;
    ensure_course_manager(&current.0.id, current.role(), &course)?;

    let main_unit = trimmed(payload.main_unit);
    let sub_unit = trimmed(payload.sub_unit);
    validate_classification(
        state.curriculum(),
        payload.assignment_type,
        payload.subject.trim(),
        main_unit.as_deref(),
        sub_unit.as_deref(),
    )?;

    let open_at = to_primitive_utc(payload.open_at);
    let due_at = to_primitive_utc(payload.due_at);
    ensure_due_after_open(open_at, due_at)?;
    validate_answer_key(&payload.answer_key, payload.question_count)?;

    let assignment = repositories::assignments::create(
        state.db(),
        repositories::assignments::CreateAssignment {
            id: &Uuid::new_v4().to_string(),
            course_id: &course.id,
            name: payload.name.trim(),
            subject: payload.subject.trim(),
            main_unit: main_unit.as_deref(),
            sub_unit: sub_unit.as_deref(),
            question_count: payload.question_count,
            assignment_type: payload.assignment_type,
            open_at,
            due_at,
            files: payload.files,
            answer_key: payload.answer_key,
            created_by: &current.0.id,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create assignment"))?;

    tracing::info!(
        user_id = %current.0.id,
        course_id = %course.id,
        assignment_id = %assignment.id,
        action = "assignment_create",
        "Assignment created"
    );

    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_message(
            "Assignment created",
            AssignmentResponse::from_db(assignment, true),
        )),
    ))
}

async fn get_assignment(
    Path(assignment_id): Path<String>,
    identity: TokenIdentity,
    State(state): State<AppState>,
) -> Result<Json<Envelope<AssignmentResponse>>, ApiError> {
    let assignment = load_assignment(&state, &assignment_id).await?;
    let include_key = role_allows(identity.role, Capability::ViewAnswerKey);
    tracing::debug!(
        user_id = %identity.user_id,
        assignment_id = %assignment_id,
        include_key,
        "Assignment fetched"
    );
    Ok(Json(Envelope::data(AssignmentResponse::from_db(assignment, include_key))))
}

async fn update_assignment(
    Path(assignment_id): Path<String>,
    current: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<AssignmentUpdate>,
) -> Result<Json<Envelope<AssignmentResponse>>, ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    let existing = load_managed_assignment(&state, &current, &assignment_id).await?;

    let merged = repositories::assignments::UpdateAssignment {
        name: payload.name.map(|name| name.trim().to_string()).unwrap_or(existing.name),
        subject: payload
            .subject
            .map(|subject| subject.trim().to_string())
            .unwrap_or(existing.subject),
        main_unit: match payload.main_unit {
            Some(value) => trimmed(Some(value)),
            None => existing.main_unit,
        },
        sub_unit: match payload.sub_unit {
            Some(value) => trimmed(Some(value)),
            None => existing.sub_unit,
        },
        question_count: payload.question_count.unwrap_or(existing.question_count),
        assignment_type: payload.assignment_type.unwrap_or(existing.assignment_type),
        open_at: payload.open_at.map(to_primitive_utc).unwrap_or(existing.open_at),
        due_at: payload.due_at.map(to_primitive_utc).unwrap_or(existing.due_at),
        files: payload.files.unwrap_or_else(|| existing.files.0.clone()),
    };

    validate_classification(
        state.curriculum(),
        merged.assignment_type,
        &merged.subject,
        merged.main_unit.as_deref(),
        merged.sub_unit.as_deref(),
    )?;
    ensure_due_after_open(merged.open_at, merged.due_at)?;

    if let Some(highest) =
        existing.answer_key.0.iter().map(|entry| entry.question_number).max()
    {
        if highest > merged.question_count {
            return Err(ApiError::BadRequest(format!(
                "questionCount {} is below answer key entry {highest}",
                merged.question_count
            )));
        }
    }

    let dropped_files = dropped_file_keys(&existing.files.0, &merged.files);

    let updated =
        repositories::assignments::update(state.db(), &assignment_id, merged, primitive_now_utc())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to update assignment"))?
            .ok_or_else(|| ApiError::NotFound("Assignment not found".to_string()))?;

    if let Some(store) = state.blobs() {
        purge_blobs(Arc::clone(store), dropped_files, "assignment_update").await;
    }

    Ok(Json(Envelope::with_message(
        "Assignment updated",
        AssignmentResponse::from_db(updated, true),
    )))
}

/// Stored keys present before an update and absent after it.
fn dropped_file_keys(before: &[AssignmentFile], after: &[AssignmentFile]) -> Vec<String> {
    let kept: HashSet<&str> = after.iter().filter_map(|file| file.key.as_deref()).collect();
    before
        .iter()
        .filter_map(|file| file.key.as_deref())
        .filter(|key| !kept.contains(key))
        .map(str::to_string)
        .collect()
}

async fn delete_assignment(
    Path(assignment_id): Path<String>,
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<()>>, ApiError> {
    load_managed_assignment(&state, &current, &assignment_id).await?;

    let blob_keys = repositories::assignments::blob_keys_for_assignment(state.db(), &assignment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to collect assignment files"))?;

    let deleted = repositories::assignments::delete(state.db(), &assignment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete assignment"))?;
    if !deleted {
        return Err(ApiError::NotFound("Assignment not found".to_string()));
    }

    let failed = match state.blobs() {
        Some(store) => purge_blobs(Arc::clone(store), blob_keys, "assignment_delete").await,
        None => 0,
    };

    tracing::info!(
        user_id = %current.0.id,
        assignment_id = %assignment_id,
        blob_failures = failed,
        action = "assignment_delete",
        "Assignment deleted"
    );

    Ok(Json(Envelope::message("Assignment deleted")))
}

async fn get_answer_key(
    Path(assignment_id): Path<String>,
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<AnswerKeyEntry>>>, ApiError> {
    let assignment = load_managed_assignment(&state, &current, &assignment_id).await?;
    let mut entries = assignment.answer_key.0;
    entries.sort_by_key(|entry| entry.question_number);
    Ok(Json(Envelope::data(entries)))
}

async fn replace_answer_key(
    Path(assignment_id): Path<String>,
    current: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<AnswerKeyReplace>,
) -> Result<Json<Envelope<Vec<AnswerKeyEntry>>>, ApiError> {
    let assignment = load_managed_assignment(&state, &current, &assignment_id).await?;
    validate_answer_key(&payload.answer_key, assignment.question_count)?;

    let mut entries = payload.answer_key;
    entries.sort_by_key(|entry| entry.question_number);

    let updated = repositories::assignments::replace_answer_key(
        state.db(),
        &assignment_id,
        entries,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to replace answer key"))?
    .ok_or_else(|| ApiError::NotFound("Assignment not found".to_string()))?;

    tracing::info!(
        user_id = %current.0.id,
        assignment_id = %assignment_id,
        entries = updated.answer_key.0.len(),
        action = "answer_key_replace",
        "Answer key replaced"
    );

    Ok(Json(Envelope::with_message("Answer key updated", updated.answer_key.0)))
}

async fn submit_answers(
    Path(assignment_id): Path<String>,
    current: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    current.require(Capability::SubmitAnswers)?;

    let assignment = load_assignment(&state, &assignment_id).await?;
    let enrolled =
        repositories::courses::is_enrolled(state.db(), &assignment.course_id, &current.0.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check enrollment"))?;
    if !enrolled {
        return Err(ApiError::Forbidden("You are not enrolled in this course"));
    }
    grading::check_answers(&payload.student_answers, assignment.question_count)?;

    enforce_rate_limit(
        &state,
        &format!("rl:submit:{assignment_id}:{}", current.0.id),
        SUBMIT_RATE_LIMIT,
        SUBMIT_RATE_WINDOW_SECONDS,
        "Submission already in progress, try again in a few seconds",
    )
    .await?;

    let outcome = submission_lifecycle::submit(
        &state,
        &assignment_id,
        &current.0.id,
        payload.student_answers,
        payload.solution_images,
    )
    .await?;

    tracing::info!(
        user_id = %current.0.id,
        assignment_id = %assignment_id,
        submission_id = %outcome.submission.id,
        resubmission = outcome.resubmission,
        skipped_images = outcome.skipped_images,
        action = "assignment_submit",
        "Assignment submitted"
    );

    Ok(Json(SubmitResponse {
        correct_count: outcome.grade.correct_count,
        wrong_count: outcome.grade.wrong_count,
        total_count: outcome.grade.total_count(),
    }))
}

async fn list_submissions(
    Path(assignment_id): Path<String>,
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<SubmissionResponse>>>, ApiError> {
    load_managed_assignment(&state, &current, &assignment_id).await?;

    let rows = repositories::submissions::list_for_assignment(state.db(), &assignment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list submissions"))?;

    Ok(Json(Envelope::data(rows.into_iter().map(SubmissionResponse::with_student).collect())))
}

async fn my_submission(
    Path(assignment_id): Path<String>,
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<SubmissionResponse>>, ApiError> {
    current.require(Capability::SubmitAnswers)?;

    let submission =
        repositories::submissions::find_for_student(state.db(), &assignment_id, &current.0.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch submission"))?
            .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;

    Ok(Json(Envelope::data(SubmissionResponse::from_db(submission))))
}

/// Keeps letters, digits, dots, dashes and underscores; anything else becomes `_`.
fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.chars().take(100).collect()
    }
}

async fn presign_file(
    current: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignRequest>,
) -> Result<Json<Envelope<PresignResponse>>, ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    if !payload.content_type.contains('/') {
        return Err(ApiError::BadRequest("contentType must be a media type".to_string()));
    }

    let course = load_course(&state, &payload.course_id).await?;
    ensure_course_manager(&current.0.id, current.role(), &course)?;

    let store = state
        .blobs()
        .ok_or_else(|| ApiError::Internal("File storage is not configured".to_string()))?;

    let key = format!(
        "assignments/{}/{}-{}",
        course.id,
        Uuid::new_v4(),
        sanitize_filename(&payload.filename)
    );
    let expires_in_seconds = state.settings().storage().presigned_url_expire_minutes * 60;

    let upload_url = store
        .presign_put(&key, &payload.content_type, Duration::from_secs(expires_in_seconds))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to presign upload"))?;

    Ok(Json(Envelope::data(PresignResponse {
        url: store.public_url(&key),
        upload_url,
        key,
        media_type: payload.content_type,
        expires_in_seconds,
    })))
}

#[cfg(test)]
mod tests;
