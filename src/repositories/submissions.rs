use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use crate::db::models::{AssignmentSubmission, StoredImage, SubmittedAnswer};

const COLUMNS: &str = "\
    id, assignment_id, student_id, answers, correct_count, wrong_count, images, submitted_at";

pub(crate) async fn find_for_student(
    pool: &PgPool,
    assignment_id: &str,
    student_id: &str,
) -> Result<Option<AssignmentSubmission>, sqlx::Error> {
    sqlx::query_as::<_, AssignmentSubmission>(&format!(
        "SELECT {COLUMNS} FROM assignment_submissions
         WHERE assignment_id = $1 AND student_id = $2",
    ))
    .bind(assignment_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

pub(crate) struct UpsertSubmission<'a> {
    /// Used only when no submission exists yet; a resubmission keeps its original id.
    pub(crate) id: &'a str,
    pub(crate) assignment_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) answers: Vec<SubmittedAnswer>,
    pub(crate) correct_count: i32,
    pub(crate) wrong_count: i32,
    pub(crate) images: Vec<StoredImage>,
    pub(crate) submitted_at: time::PrimitiveDateTime,
}

pub(crate) async fn upsert(
    pool: &PgPool,
    params: UpsertSubmission<'_>,
) -> Result<AssignmentSubmission, sqlx::Error> {
    sqlx::query_as::<_, AssignmentSubmission>(&format!(
        "INSERT INTO assignment_submissions (
            id, assignment_id, student_id, answers, correct_count, wrong_count,
            images, submitted_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
         ON CONFLICT (assignment_id, student_id)
         DO UPDATE SET answers = EXCLUDED.answers,
                       correct_count = EXCLUDED.correct_count,
                       wrong_count = EXCLUDED.wrong_count,
                       images = EXCLUDED.images,
                       submitted_at = EXCLUDED.submitted_at
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.assignment_id)
    .bind(params.student_id)
    .bind(Json(params.answers))
    .bind(params.correct_count)
    .bind(params.wrong_count)
    .bind(Json(params.images))
    .bind(params.submitted_at)
    .fetch_one(pool)
    .await
}

#[derive(Debug, FromRow)]
pub(crate) struct SubmissionWithStudent {
    #[sqlx(flatten)]
    pub(crate) submission: AssignmentSubmission,
    pub(crate) student_username: String,
    pub(crate) student_name: String,
}

pub(crate) async fn list_for_assignment(
    pool: &PgPool,
    assignment_id: &str,
) -> Result<Vec<SubmissionWithStudent>, sqlx::Error> {
    sqlx::query_as::<_, SubmissionWithStudent>(
        "SELECT s.id, s.assignment_id, s.student_id, s.answers, s.correct_count,
                s.wrong_count, s.images, s.submitted_at,
                u.username AS student_username, u.full_name AS student_name
         FROM assignment_submissions s
         JOIN users u ON u.id = s.student_id
         WHERE s.assignment_id = $1
         ORDER BY s.submitted_at DESC, s.id ASC",
    )
    .bind(assignment_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn image_keys_for_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT i->>'key' FROM assignment_submissions s, jsonb_array_elements(s.images) i
         WHERE s.student_id = $1 AND i->>'key' IS NOT NULL",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
}
