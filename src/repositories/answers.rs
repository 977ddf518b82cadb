use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::Answer;

const COLUMNS: &str = "\
    id, assignment_id, course_id, question_number, answer_text, point_value, \
    created_at, updated_at";

pub(crate) struct NewAnswer {
    pub(crate) question_number: i32,
    pub(crate) answer_text: String,
    pub(crate) point_value: f64,
}

pub(crate) async fn create(
    pool: &PgPool,
    assignment_id: &str,
    course_id: &str,
    answer: &NewAnswer,
    created_at: time::PrimitiveDateTime,
) -> Result<Answer, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "INSERT INTO answers (
            id, assignment_id, course_id, question_number, answer_text, point_value,
            created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$7)
         RETURNING {COLUMNS}",
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(assignment_id)
    .bind(course_id)
    .bind(answer.question_number)
    .bind(&answer.answer_text)
    .bind(answer.point_value)
    .bind(created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!("SELECT {COLUMNS} FROM answers WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_for_assignment(
    pool: &PgPool,
    assignment_id: &str,
    course_id: &str,
) -> Result<Vec<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "SELECT {COLUMNS} FROM answers
         WHERE assignment_id = $1 AND course_id = $2
         ORDER BY question_number ASC",
    ))
    .bind(assignment_id)
    .bind(course_id)
    .fetch_all(pool)
    .await
}

#[derive(Default)]
pub(crate) struct UpdateAnswer {
    pub(crate) question_number: Option<i32>,
    pub(crate) answer_text: Option<String>,
    pub(crate) point_value: Option<f64>,
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    params: UpdateAnswer,
    updated_at: time::PrimitiveDateTime,
) -> Result<Option<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "UPDATE answers SET
            question_number = COALESCE($1, question_number),
            answer_text = COALESCE($2, answer_text),
            point_value = COALESCE($3, point_value),
            updated_at = $4
         WHERE id = $5
         RETURNING {COLUMNS}",
    ))
    .bind(params.question_number)
    .bind(params.answer_text)
    .bind(params.point_value)
    .bind(updated_at)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM answers WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// Swaps the whole answer set of an (assignment, course) pair in one transaction, so a
/// failed insert leaves the previous set untouched.
pub(crate) async fn replace_all(
    pool: &PgPool,
    assignment_id: &str,
    course_id: &str,
    answers: &[NewAnswer],
    now: time::PrimitiveDateTime,
) -> Result<Vec<Answer>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM answers WHERE assignment_id = $1 AND course_id = $2")
        .bind(assignment_id)
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

    let mut inserted = Vec::with_capacity(answers.len());
    for answer in answers {
        let row = sqlx::query_as::<_, Answer>(&format!(
            "INSERT INTO answers (
                id, assignment_id, course_id, question_number, answer_text, point_value,
                created_at, updated_at
             ) VALUES ($1,$2,$3,$4,$5,$6,$7,$7)
             RETURNING {COLUMNS}",
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(assignment_id)
        .bind(course_id)
        .bind(answer.question_number)
        .bind(&answer.answer_text)
        .bind(answer.point_value)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        inserted.push(row);
    }

    tx.commit().await?;
    inserted.sort_by_key(|answer| answer.question_number);
    Ok(inserted)
}
