use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::{dropped_file_keys, sanitize_filename};
use crate::db::models::AssignmentFile;
use crate::db::types::UserRole;
use crate::test_support::{self, MemoryBlobStore, TestContext};

const PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";
const GIF: &str = "data:image/gif;base64,R0lGODlhAQABAAAAACw=";

fn file(key: Option<&str>) -> AssignmentFile {
    AssignmentFile {
        url: format!("https://files.example.test/{}", key.unwrap_or("external")),
        key: key.map(str::to_string),
        media_type: "application/pdf".to_string(),
    }
}

#[test]
fn dropped_files_are_the_removed_stored_keys() {
    let before = [file(Some("a.pdf")), file(Some("b.pdf")), file(None)];
    let after = [file(Some("b.pdf"))];
    assert_eq!(dropped_file_keys(&before, &after), vec!["a.pdf".to_string()]);
    assert!(dropped_file_keys(&after, &before).is_empty());
}

#[test]
fn filenames_are_sanitized_for_keys() {
    assert_eq!(sanitize_filename("1단원 문제지.pdf"), "1______.pdf");
    assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
    assert_eq!(sanitize_filename("..."), "file");
}

fn quiz_payload(course_id: &str) -> Value {
    json!({
        "courseId": course_id,
        "name": "소인수분해 퀴즈",
        "subject": "중1-1",
        "mainUnit": "수와 연산",
        "subUnit": "소인수분해",
        "questionCount": 2,
        "type": "QUIZ",
        "openAt": "2025-03-01T00:00:00Z",
        "dueAt": "2025-03-31T00:00:00Z",
        "answerKey": [
            {"questionNumber": 1, "answerText": "3"},
            {"questionNumber": 2, "answerText": "x=5"}
        ]
    })
}

async fn send(
    ctx: &TestContext,
    method: Method,
    uri: &str,
    token: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(method, uri, Some(token), body))
        .await
        .expect("response");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

#[tokio::test]
#[ignore = "requires Postgres and Redis test instances"]
async fn submit_grades_and_resubmission_replaces() {
    let ctx = test_support::setup_test_context().await;

    let teacher = test_support::insert_user(ctx.state.db(), "teacher01", UserRole::Teacher).await;
    let student = test_support::insert_user(ctx.state.db(), "student01", UserRole::Student).await;
    let course = test_support::insert_course(ctx.state.db(), "중1 A반", &teacher.id).await;
    test_support::enroll(ctx.state.db(), &course.id, &student.id).await;

    let teacher_token = test_support::bearer_token(&teacher, ctx.state.settings());
    let student_token = test_support::bearer_token(&student, ctx.state.settings());

    let (status, created) = send(
        &ctx,
        Method::POST,
        "/api/assignments",
        &teacher_token,
        Some(quiz_payload(&course.id)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "response: {created}");
    let assignment_id = created["data"]["id"].as_str().expect("id").to_string();

    let (status, detail) =
        send(&ctx, Method::GET, &format!("/api/assignments/{assignment_id}"), &student_token, None)
            .await;
    assert_eq!(status, StatusCode::OK, "response: {detail}");
    assert!(detail["data"].get("answerKey").is_none());

    let submit_uri = format!("/api/assignments/{assignment_id}/submit");
    let answers = json!({
        "studentAnswers": [
            {"questionNumber": 1, "answer": "3"},
            {"questionNumber": 2, "answer": "X=5 "}
        ]
    });
    let (status, graded) =
        send(&ctx, Method::POST, &submit_uri, &student_token, Some(answers.clone())).await;
    assert_eq!(status, StatusCode::OK, "response: {graded}");
    assert_eq!(graded, json!({"correctCount": 2, "wrongCount": 0, "totalCount": 2}));

    test_support::reset_redis(ctx.state.settings().redis().redis_url()).await.expect("reset");

    let (status, regraded) =
        send(&ctx, Method::POST, &submit_uri, &student_token, Some(answers)).await;
    assert_eq!(status, StatusCode::OK, "response: {regraded}");
    assert_eq!(regraded, graded);

    let (status, listed) = send(
        &ctx,
        Method::GET,
        &format!("/api/assignments/{assignment_id}/submissions"),
        &teacher_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {listed}");
    assert_eq!(listed["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(listed["data"][0]["studentUsername"], "student01");

    let (status, mine) = send(
        &ctx,
        Method::GET,
        &format!("/api/assignments/{assignment_id}/submissions/me"),
        &student_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {mine}");
    assert_eq!(mine["data"]["correctCount"], 2);
}

#[tokio::test]
#[ignore = "requires Postgres and Redis test instances"]
async fn submit_rejects_empty_answers_and_outsiders() {
    let ctx = test_support::setup_test_context().await;

    let teacher = test_support::insert_user(ctx.state.db(), "teacher02", UserRole::Teacher).await;
    let student = test_support::insert_user(ctx.state.db(), "student02", UserRole::Student).await;
    let outsider = test_support::insert_user(ctx.state.db(), "student03", UserRole::Student).await;
    let course = test_support::insert_course(ctx.state.db(), "중1 B반", &teacher.id).await;
    test_support::enroll(ctx.state.db(), &course.id, &student.id).await;

    let teacher_token = test_support::bearer_token(&teacher, ctx.state.settings());
    let (_, created) = send(
        &ctx,
        Method::POST,
        "/api/assignments",
        &teacher_token,
        Some(quiz_payload(&course.id)),
    )
    .await;
    let assignment_id = created["data"]["id"].as_str().expect("id").to_string();
    let submit_uri = format!("/api/assignments/{assignment_id}/submit");

    let student_token = test_support::bearer_token(&student, ctx.state.settings());
    let (status, body) = send(
        &ctx,
        Method::POST,
        &submit_uri,
        &student_token,
        Some(json!({"studentAnswers": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let outsider_token = test_support::bearer_token(&outsider, ctx.state.settings());
    let (status, _) = send(
        &ctx,
        Method::POST,
        &submit_uri,
        &outsider_token,
        Some(json!({"studentAnswers": [{"questionNumber": 1, "answer": "3"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &ctx,
        Method::POST,
        "/api/assignments/missing/submit",
        &student_token,
        Some(json!({"studentAnswers": [{"questionNumber": 1, "answer": "3"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires Postgres and Redis test instances"]
async fn update_rejects_shrinking_below_answer_key() {
    let ctx = test_support::setup_test_context().await;

    let teacher = test_support::insert_user(ctx.state.db(), "teacher04", UserRole::Teacher).await;
    let course = test_support::insert_course(ctx.state.db(), "중1 C반", &teacher.id).await;
    let token = test_support::bearer_token(&teacher, ctx.state.settings());

    let (_, created) =
        send(&ctx, Method::POST, "/api/assignments", &token, Some(quiz_payload(&course.id))).await;
    let assignment_id = created["data"]["id"].as_str().expect("id").to_string();
    let uri = format!("/api/assignments/{assignment_id}");

    let (status, _) =
        send(&ctx, Method::PATCH, &uri, &token, Some(json!({"questionCount": 1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &ctx,
        Method::PATCH,
        &uri,
        &token,
        Some(json!({"questionCount": 5, "name": "개정판"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"]["questionCount"], 5);
    assert_eq!(body["data"]["name"], "개정판");
    assert_eq!(body["data"]["subUnit"], "소인수분해");

    let (status, _) = send(
        &ctx,
        Method::PUT,
        &format!("{uri}/answer-key"),
        &token,
        Some(json!({"answerKey": [{"questionNumber": 6, "answerText": "1"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires Postgres and Redis test instances"]
async fn resubmission_replaces_stored_images() {
    let store = Arc::new(MemoryBlobStore::default());
    let ctx = test_support::setup_test_context_with_blobs(store.clone()).await;

    let teacher = test_support::insert_user(ctx.state.db(), "teacher05", UserRole::Teacher).await;
    let student = test_support::insert_user(ctx.state.db(), "student05", UserRole::Student).await;
    let course = test_support::insert_course(ctx.state.db(), "중1 D반", &teacher.id).await;
    test_support::enroll(ctx.state.db(), &course.id, &student.id).await;

    let teacher_token = test_support::bearer_token(&teacher, ctx.state.settings());
    let student_token = test_support::bearer_token(&student, ctx.state.settings());
    let (_, created) = send(
        &ctx,
        Method::POST,
        "/api/assignments",
        &teacher_token,
        Some(quiz_payload(&course.id)),
    )
    .await;
    let assignment_id = created["data"]["id"].as_str().expect("id").to_string();
    let submit_uri = format!("/api/assignments/{assignment_id}/submit");
    let with_image = |image: &str| {
        json!({
            "studentAnswers": [{"questionNumber": 1, "answer": "3"}],
            "solutionImages": [image]
        })
    };

    let (status, body) =
        send(&ctx, Method::POST, &submit_uri, &student_token, Some(with_image(PNG))).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    let first_keys = store.keys();
    assert_eq!(first_keys.len(), 1);
    let prefix = format!("submissions/{assignment_id}/{}/", student.id);
    assert!(first_keys[0].starts_with(&prefix) && first_keys[0].ends_with(".png"));

    test_support::reset_redis(ctx.state.settings().redis().redis_url()).await.expect("reset");
    let (status, body) =
        send(&ctx, Method::POST, &submit_uri, &student_token, Some(with_image(GIF))).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    let second_keys = store.keys();
    assert_eq!(second_keys.len(), 1);
    assert_ne!(second_keys[0], first_keys[0]);
    assert!(second_keys[0].ends_with(".gif"));

    let (status, listed) = send(
        &ctx,
        Method::GET,
        &format!("/api/assignments/{assignment_id}/submissions"),
        &teacher_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {listed}");
    assert_eq!(listed["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(listed["data"][0]["images"][0]["key"], second_keys[0].as_str());

    // A rejected upload leaves the submission itself intact.
    store.fail_uploads_with_type("image/png");
    test_support::reset_redis(ctx.state.settings().redis().redis_url()).await.expect("reset");
    let (status, body) =
        send(&ctx, Method::POST, &submit_uri, &student_token, Some(with_image(PNG))).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["correctCount"], 1);
    assert!(store.keys().is_empty());

    let (_, mine) = send(
        &ctx,
        Method::GET,
        &format!("/api/assignments/{assignment_id}/submissions/me"),
        &student_token,
        None,
    )
    .await;
    assert_eq!(mine["data"]["images"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
#[ignore = "requires Postgres and Redis test instances"]
async fn submit_rejects_repeated_and_out_of_range_questions() {
    let ctx = test_support::setup_test_context().await;

    let teacher = test_support::insert_user(ctx.state.db(), "teacher06", UserRole::Teacher).await;
    let student = test_support::insert_user(ctx.state.db(), "student06", UserRole::Student).await;
    let course = test_support::insert_course(ctx.state.db(), "중1 E반", &teacher.id).await;
    test_support::enroll(ctx.state.db(), &course.id, &student.id).await;

    let teacher_token = test_support::bearer_token(&teacher, ctx.state.settings());
    let (_, created) = send(
        &ctx,
        Method::POST,
        "/api/assignments",
        &teacher_token,
        Some(quiz_payload(&course.id)),
    )
    .await;
    let assignment_id = created["data"]["id"].as_str().expect("id").to_string();
    let submit_uri = format!("/api/assignments/{assignment_id}/submit");
    let student_token = test_support::bearer_token(&student, ctx.state.settings());

    let repeated = json!({"studentAnswers": vec![json!({"questionNumber": 1, "answer": "3"}); 5]});
    let (status, body) = send(&ctx, Method::POST, &submit_uri, &student_token, Some(repeated)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let out_of_range = json!({"studentAnswers": [{"questionNumber": 3, "answer": "3"}]});
    let (status, body) =
        send(&ctx, Method::POST, &submit_uri, &student_token, Some(out_of_range)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");

    // Rejected attempts do not use up the rate-limit slot.
    let valid = json!({"studentAnswers": [{"questionNumber": 1, "answer": "3"}]});
    let (status, body) = send(&ctx, Method::POST, &submit_uri, &student_token, Some(valid)).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body, json!({"correctCount": 1, "wrongCount": 0, "totalCount": 1}));
}
