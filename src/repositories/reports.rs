use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::types::AssignmentType;
use crate::services::study_report::{QuizAssignment, QuizSubmission};

/// Quiz assignments of a course regardless of their own open/due dates.
pub(crate) async fn quiz_assignments(
    pool: &PgPool,
    course_id: &str,
) -> Result<Vec<QuizAssignment>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, String, Option<String>, Option<String>, i32)>(
        "SELECT id, subject, main_unit, sub_unit, question_count
         FROM assignments
         WHERE course_id = $1 AND assignment_type = $2
         ORDER BY created_at ASC, id ASC",
    )
    .bind(course_id)
    .bind(AssignmentType::Quiz)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, subject, main_unit, sub_unit, question_count)| QuizAssignment {
            id,
            subject,
            main_unit,
            sub_unit,
            question_count,
        })
        .collect())
}

/// Quiz submissions of currently enrolled students submitted inside `[start, end]`.
pub(crate) async fn quiz_submissions(
    pool: &PgPool,
    course_id: &str,
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
) -> Result<Vec<QuizSubmission>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, String, i32, PrimitiveDateTime)>(
        "SELECT s.assignment_id, s.student_id, s.correct_count, s.submitted_at
         FROM assignment_submissions s
         JOIN assignments a ON a.id = s.assignment_id
         JOIN course_students cs ON cs.course_id = a.course_id AND cs.student_id = s.student_id
         WHERE a.course_id = $1
           AND a.assignment_type = $2
           AND s.submitted_at >= $3
           AND s.submitted_at <= $4",
    )
    .bind(course_id)
    .bind(AssignmentType::Quiz)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(assignment_id, student_id, correct_count, submitted_at)| QuizSubmission {
            assignment_id,
            student_id,
            correct_count,
            submitted_at,
        })
        .collect())
}
