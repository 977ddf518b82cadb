use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::{load_course, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::{format_offset, to_primitive_utc};
use crate::db::models::Course;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::report::{ReportPeriod, StudyReportQuery, StudyReportResponse};
use crate::services::access_policy::Capability;
use crate::services::study_report::{self, resolve_window, WindowQuery};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/:student_id/study-report", get(study_report))
}

/// Self and admins see every course. Teachers must teach the student somewhere, and the
/// returned id then limits the report to courses they own.
async fn ensure_report_access(
    state: &AppState,
    current: &CurrentUser,
    student_id: &str,
) -> Result<Option<String>, ApiError> {
    if current.0.id == student_id || current.allows(Capability::ViewAnyReport) {
        return Ok(None);
    }
    if current.role() == UserRole::Teacher {
        let teaches = repositories::courses::teaches_student(state.db(), &current.0.id, student_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check teacher access"))?;
        if teaches {
            return Ok(Some(current.0.id.clone()));
        }
    }
    Err(ApiError::Forbidden("You cannot view this student's report"))
}

/// The requested course when given (the student must be enrolled), otherwise the first
/// course the student enrolled in.
async fn resolve_course(
    state: &AppState,
    student_id: &str,
    course_id: Option<&str>,
    taught_by: Option<&str>,
) -> Result<Course, ApiError> {
    let Some(course_id) = course_id else {
        return repositories::courses::first_enrolled_course(state.db(), student_id, taught_by)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to resolve course"))?
            .ok_or_else(|| ApiError::NotFound("Student is not enrolled in any course".to_string()));
    };

    let course = load_course(state, course_id).await?;
    if taught_by.is_some_and(|teacher_id| course.teacher_id != teacher_id) {
        return Err(ApiError::Forbidden("You do not teach this course"));
    }
    let enrolled = repositories::courses::is_enrolled(state.db(), &course.id, student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check enrollment"))?;
    if !enrolled {
        return Err(ApiError::NotFound("Student is not enrolled in this course".to_string()));
    }
    Ok(course)
}

async fn study_report(
    Path(student_id): Path<String>,
    Query(params): Query<StudyReportQuery>,
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<StudyReportResponse>, ApiError> {
    let window = resolve_window(
        &WindowQuery {
            year: params.year,
            month: params.month,
            start_date: params.start_date.as_deref(),
            end_date: params.end_date.as_deref(),
        },
        state.settings().report().utc_offset(),
    )?;

    let taught_by = ensure_report_access(&state, &current, &student_id).await?;

    let student_exists = repositories::users::find_by_id(state.db(), &student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch student"))?
        .is_some();
    if !student_exists {
        return Err(ApiError::NotFound("Student not found".to_string()));
    }

    let course =
        resolve_course(&state, &student_id, params.course_id.as_deref(), taught_by.as_deref())
            .await?;

    let assignments = repositories::reports::quiz_assignments(state.db(), &course.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load quiz assignments"))?;
    let submissions = repositories::reports::quiz_submissions(
        state.db(),
        &course.id,
        to_primitive_utc(window.start),
        to_primitive_utc(window.end),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to load quiz submissions"))?;
    let enrolled = repositories::courses::student_ids(state.db(), &course.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load course roster"))?;

    let summary = study_report::summarize(
        state.curriculum(),
        &student_id,
        &enrolled,
        &assignments,
        &submissions,
        &window,
    );

    tracing::info!(
        requested_by = %current.0.id,
        student_id = %student_id,
        course_id = %course.id,
        total_questions = summary.total_questions,
        peer_count = summary.peer_count,
        "Study report generated"
    );

    Ok(Json(StudyReportResponse {
        student_id,
        course_id: course.id,
        course_name: course.name,
        period: ReportPeriod {
            start: format_offset(window.start),
            end: format_offset(window.end),
        },
        summary,
    }))
}
