use std::collections::HashSet;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use validator::Validate;

use crate::api::assignments::load_managed_assignment;
use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::pagination::Envelope;
use crate::api::validation::validate_question_number;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::is_unique_violation;
use crate::db::models::{Answer, Assignment};
use crate::repositories;
use crate::repositories::answers::NewAnswer;
use crate::schemas::answer::{
    AnswerBulkReplace, AnswerCreate, AnswerListQuery, AnswerResponse, AnswerUpdate,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_answers).post(create_answer))
        .route("/bulk", put(replace_answers))
        .route("/:answer_id", get(get_answer).patch(update_answer).delete(delete_answer))
}

fn duplicate_conflict(question_number: i32) -> ApiError {
    ApiError::Conflict(format!("An answer for question {question_number} already exists"))
}

/// Loads a managed assignment and checks that it belongs to `course_id`.
async fn load_scope(
    state: &AppState,
    current: &CurrentUser,
    assignment_id: &str,
    course_id: &str,
) -> Result<Assignment, ApiError> {
    let assignment = load_managed_assignment(state, current, assignment_id).await?;
    if assignment.course_id != course_id {
        return Err(ApiError::BadRequest(
            "Assignment does not belong to the given course".to_string(),
        ));
    }
    Ok(assignment)
}

/// Answer row plus the managed assignment it hangs off.
async fn load_managed_answer(
    state: &AppState,
    current: &CurrentUser,
    answer_id: &str,
) -> Result<(Answer, Assignment), ApiError> {
    let answer = repositories::answers::find_by_id(state.db(), answer_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch answer"))?
        .ok_or_else(|| ApiError::NotFound("Answer not found".to_string()))?;
    let assignment = load_managed_assignment(state, current, &answer.assignment_id).await?;
    Ok((answer, assignment))
}

async fn list_answers(
    Query(params): Query<AnswerListQuery>,
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<AnswerResponse>>>, ApiError> {
    load_scope(&state, &current, &params.assignment_id, &params.course_id).await?;

    let answers = repositories::answers::list_for_assignment(
        state.db(),
        &params.assignment_id,
        &params.course_id,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list answers"))?;

    Ok(Json(Envelope::data(answers.into_iter().map(AnswerResponse::from_db).collect())))
}

async fn create_answer(
    current: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<AnswerCreate>,
) -> Result<(StatusCode, Json<Envelope<AnswerResponse>>), ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    let assignment =
        load_scope(&state, &current, &payload.assignment_id, &payload.course_id).await?;
    validate_question_number(payload.question_number, assignment.question_count)?;

    let answer = repositories::answers::create(
        state.db(),
        &assignment.id,
        &assignment.course_id,
        &NewAnswer {
            question_number: payload.question_number,
            answer_text: payload.answer_text.trim().to_string(),
            point_value: payload.point_value,
        },
        primitive_now_utc(),
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            duplicate_conflict(payload.question_number)
        } else {
            ApiError::internal(e, "Failed to create answer")
        }
    })?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_message("Answer created", AnswerResponse::from_db(answer))),
    ))
}

async fn get_answer(
    Path(answer_id): Path<String>,
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<AnswerResponse>>, ApiError> {
    let (answer, _) = load_managed_answer(&state, &current, &answer_id).await?;
    Ok(Json(Envelope::data(AnswerResponse::from_db(answer))))
}

async fn update_answer(
    Path(answer_id): Path<String>,
    current: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<AnswerUpdate>,
) -> Result<Json<Envelope<AnswerResponse>>, ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    let (_, assignment) = load_managed_answer(&state, &current, &answer_id).await?;
    if let Some(question_number) = payload.question_number {
        validate_question_number(question_number, assignment.question_count)?;
    }

    let updated = repositories::answers::update(
        state.db(),
        &answer_id,
        repositories::answers::UpdateAnswer {
            question_number: payload.question_number,
            answer_text: payload.answer_text.map(|text| text.trim().to_string()),
            point_value: payload.point_value,
        },
        primitive_now_utc(),
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            duplicate_conflict(payload.question_number.unwrap_or_default())
        } else {
            ApiError::internal(e, "Failed to update answer")
        }
    })?
    .ok_or_else(|| ApiError::NotFound("Answer not found".to_string()))?;

    Ok(Json(Envelope::with_message("Answer updated", AnswerResponse::from_db(updated))))
}

async fn delete_answer(
    Path(answer_id): Path<String>,
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<()>>, ApiError> {
    load_managed_answer(&state, &current, &answer_id).await?;

    let deleted = repositories::answers::delete(state.db(), &answer_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete answer"))?;
    if !deleted {
        return Err(ApiError::NotFound("Answer not found".to_string()));
    }

    Ok(Json(Envelope::message("Answer deleted")))
}

async fn replace_answers(
    current: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<AnswerBulkReplace>,
) -> Result<Json<Envelope<Vec<AnswerResponse>>>, ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    let assignment =
        load_scope(&state, &current, &payload.assignment_id, &payload.course_id).await?;

    let mut seen = HashSet::new();
    for item in &payload.answers {
        validate_question_number(item.question_number, assignment.question_count)?;
        if !seen.insert(item.question_number) {
            return Err(duplicate_conflict(item.question_number));
        }
    }

    let answers: Vec<NewAnswer> = payload
        .answers
        .into_iter()
        .map(|item| NewAnswer {
            question_number: item.question_number,
            answer_text: item.answer_text.trim().to_string(),
            point_value: item.point_value,
        })
        .collect();

    let stored = repositories::answers::replace_all(
        state.db(),
        &assignment.id,
        &assignment.course_id,
        &answers,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("Duplicate question number in answer set".to_string())
        } else {
            ApiError::internal(e, "Failed to replace answers")
        }
    })?;

    tracing::info!(
        user_id = %current.0.id,
        assignment_id = %assignment.id,
        count = stored.len(),
        action = "answers_replace",
        "Answer set replaced"
    );

    Ok(Json(Envelope::with_message(
        "Answers replaced",
        stored.into_iter().map(AnswerResponse::from_db).collect(),
    )))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use time::macros::datetime;
    use tower::ServiceExt;

    use crate::db::types::{AssignmentType, UserRole};
    use crate::repositories;
    use crate::test_support;

    #[tokio::test]
    #[ignore = "requires Postgres and Redis test instances"]
    async fn bulk_replace_swaps_the_whole_set() {
        let ctx = test_support::setup_test_context().await;

        let teacher =
            test_support::insert_user(ctx.state.db(), "teacher01", UserRole::Teacher).await;
        let course = test_support::insert_course(ctx.state.db(), "중2 A반", &teacher.id).await;
        let assignment = test_support::insert_assignment(
            ctx.state.db(),
            &course.id,
            &teacher.id,
            AssignmentType::Clinic,
            3,
            datetime!(2025-03-01 00:00),
        )
        .await;
        let token = test_support::bearer_token(&teacher, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/answers",
                Some(&token),
                Some(json!({
                    "assignmentId": assignment.id,
                    "courseId": course.id,
                    "questionNumber": 1,
                    "answerText": "12"
                })),
            ))
            .await
            .expect("create answer");
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/answers",
                Some(&token),
                Some(json!({
                    "assignmentId": assignment.id,
                    "courseId": course.id,
                    "questionNumber": 1,
                    "answerText": "13"
                })),
            ))
            .await
            .expect("duplicate answer");
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::PUT,
                "/api/answers/bulk",
                Some(&token),
                Some(json!({
                    "assignmentId": assignment.id,
                    "courseId": course.id,
                    "answers": [
                        {"questionNumber": 2, "answerText": "4", "pointValue": 2.0},
                        {"questionNumber": 3, "answerText": "-1"}
                    ]
                })),
            ))
            .await
            .expect("bulk replace");
        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "response: {body}");
        assert_eq!(body["data"][0]["questionNumber"], 2);

        let stored =
            repositories::answers::list_for_assignment(ctx.state.db(), &assignment.id, &course.id)
                .await
                .expect("list answers");
        let numbers: Vec<i32> = stored.iter().map(|answer| answer.question_number).collect();
        assert_eq!(numbers, vec![2, 3]);
    }

    #[tokio::test]
    #[ignore = "requires Postgres and Redis test instances"]
    async fn bulk_replace_out_of_range_keeps_previous_set() {
        let ctx = test_support::setup_test_context().await;

        let teacher =
            test_support::insert_user(ctx.state.db(), "teacher02", UserRole::Teacher).await;
        let course = test_support::insert_course(ctx.state.db(), "중2 B반", &teacher.id).await;
        let assignment = test_support::insert_assignment(
            ctx.state.db(),
            &course.id,
            &teacher.id,
            AssignmentType::Clinic,
            2,
            datetime!(2025-03-01 00:00),
        )
        .await;
        repositories::answers::create(
            ctx.state.db(),
            &assignment.id,
            &course.id,
            &repositories::answers::NewAnswer {
                question_number: 1,
                answer_text: "7".to_string(),
                point_value: 1.0,
            },
            datetime!(2025-03-01 00:00),
        )
        .await
        .expect("seed answer");
        let token = test_support::bearer_token(&teacher, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::PUT,
                "/api/answers/bulk",
                Some(&token),
                Some(json!({
                    "assignmentId": assignment.id,
                    "courseId": course.id,
                    "answers": [{"questionNumber": 3, "answerText": "9"}]
                })),
            ))
            .await
            .expect("bulk replace");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let stored =
            repositories::answers::list_for_assignment(ctx.state.db(), &assignment.id, &course.id)
                .await
                .expect("list answers");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].answer_text, "7");
    }
}
