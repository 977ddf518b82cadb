use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::models::{AnswerKeyEntry, Assignment, AssignmentFile};
use crate::db::types::AssignmentType;

const COLUMNS: &str = "\
    id, course_id, name, subject, main_unit, sub_unit, question_count, assignment_type, \
    open_at, due_at, files, answer_key, created_by, created_at, updated_at";

const PREFIXED_COLUMNS: &str = "\
    a.id, a.course_id, a.name, a.subject, a.main_unit, a.sub_unit, a.question_count, \
    a.assignment_type, a.open_at, a.due_at, a.files, a.answer_key, a.created_by, \
    a.created_at, a.updated_at";

pub(crate) struct CreateAssignment<'a> {
    pub(crate) id: &'a str,
    pub(crate) course_id: &'a str,
    pub(crate) name: &'a str,
    pub(crate) subject: &'a str,
    pub(crate) main_unit: Option<&'a str>,
    pub(crate) sub_unit: Option<&'a str>,
    pub(crate) question_count: i32,
    pub(crate) assignment_type: AssignmentType,
    pub(crate) open_at: time::PrimitiveDateTime,
    pub(crate) due_at: time::PrimitiveDateTime,
    pub(crate) files: Vec<AssignmentFile>,
    pub(crate) answer_key: Vec<AnswerKeyEntry>,
    pub(crate) created_by: &'a str,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateAssignment<'_>,
) -> Result<Assignment, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "INSERT INTO assignments (
            id, course_id, name, subject, main_unit, sub_unit, question_count,
            assignment_type, open_at, due_at, files, answer_key, created_by,
            created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$14)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.course_id)
    .bind(params.name)
    .bind(params.subject)
    .bind(params.main_unit)
    .bind(params.sub_unit)
    .bind(params.question_count)
    .bind(params.assignment_type)
    .bind(params.open_at)
    .bind(params.due_at)
    .bind(Json(params.files))
    .bind(Json(params.answer_key))
    .bind(params.created_by)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    assignment_id: &str,
) -> Result<Option<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!("SELECT {COLUMNS} FROM assignments WHERE id = $1"))
        .bind(assignment_id)
        .fetch_optional(pool)
        .await
}

/// Merged view of an update; the handler fills unchanged fields from the stored row so
/// cross-field rules (due after open, key inside question count) are checked on the result.
pub(crate) struct UpdateAssignment {
    pub(crate) name: String,
    pub(crate) subject: String,
    pub(crate) main_unit: Option<String>,
    pub(crate) sub_unit: Option<String>,
    pub(crate) question_count: i32,
    pub(crate) assignment_type: AssignmentType,
    pub(crate) open_at: time::PrimitiveDateTime,
    pub(crate) due_at: time::PrimitiveDateTime,
    pub(crate) files: Vec<AssignmentFile>,
}

pub(crate) async fn update(
    pool: &PgPool,
    assignment_id: &str,
    params: UpdateAssignment,
    updated_at: time::PrimitiveDateTime,
) -> Result<Option<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "UPDATE assignments SET
            name = $1,
            subject = $2,
            main_unit = $3,
            sub_unit = $4,
            question_count = $5,
            assignment_type = $6,
            open_at = $7,
            due_at = $8,
            files = $9,
            updated_at = $10
         WHERE id = $11
         RETURNING {COLUMNS}",
    ))
    .bind(params.name)
    .bind(params.subject)
    .bind(params.main_unit)
    .bind(params.sub_unit)
    .bind(params.question_count)
    .bind(params.assignment_type)
    .bind(params.open_at)
    .bind(params.due_at)
    .bind(Json(params.files))
    .bind(updated_at)
    .bind(assignment_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn replace_answer_key(
    pool: &PgPool,
    assignment_id: &str,
    answer_key: Vec<AnswerKeyEntry>,
    updated_at: time::PrimitiveDateTime,
) -> Result<Option<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "UPDATE assignments SET answer_key = $1, updated_at = $2
         WHERE id = $3
         RETURNING {COLUMNS}",
    ))
    .bind(Json(answer_key))
    .bind(updated_at)
    .bind(assignment_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete(pool: &PgPool, assignment_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM assignments WHERE id = $1")
        .bind(assignment_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Default)]
pub(crate) struct ListAssignments {
    pub(crate) course_id: Option<String>,
    pub(crate) assignment_type: Option<AssignmentType>,
    /// Restricts results to courses the student is enrolled in.
    pub(crate) enrolled_student: Option<String>,
    /// Restricts results to courses the teacher owns.
    pub(crate) teacher_id: Option<String>,
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &ListAssignments) {
    builder.push(" WHERE 1=1");
    if let Some(course_id) = &filter.course_id {
        builder.push(" AND a.course_id = ").push_bind(course_id.clone());
    }
    if let Some(assignment_type) = filter.assignment_type {
        builder.push(" AND a.assignment_type = ").push_bind(assignment_type);
    }
    if let Some(student_id) = &filter.enrolled_student {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM course_students cs \
                 WHERE cs.course_id = a.course_id AND cs.student_id = ",
            )
            .push_bind(student_id.clone())
            .push(")");
    }
    if let Some(teacher_id) = &filter.teacher_id {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM courses c \
                 WHERE c.id = a.course_id AND c.teacher_id = ",
            )
            .push_bind(teacher_id.clone())
            .push(")");
    }
}

pub(crate) async fn list(
    pool: &PgPool,
    filter: &ListAssignments,
    skip: i64,
    limit: i64,
) -> Result<Vec<Assignment>, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Postgres>::new(format!("SELECT {PREFIXED_COLUMNS} FROM assignments a"));
    push_filters(&mut builder, filter);
    builder
        .push(" ORDER BY a.due_at DESC, a.id ASC OFFSET ")
        .push_bind(skip)
        .push(" LIMIT ")
        .push_bind(limit);

    builder.build_query_as::<Assignment>().fetch_all(pool).await
}

pub(crate) async fn count(pool: &PgPool, filter: &ListAssignments) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM assignments a");
    push_filters(&mut builder, filter);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

pub(crate) async fn ids_for_course(
    pool: &PgPool,
    course_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT id FROM assignments WHERE course_id = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await
}

/// Stored attachment keys of one assignment: its files plus every submission image.
pub(crate) async fn blob_keys_for_assignment(
    pool: &PgPool,
    assignment_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT f->>'key' FROM assignments a, jsonb_array_elements(a.files) f
         WHERE a.id = $1 AND f->>'key' IS NOT NULL
         UNION ALL
         SELECT i->>'key' FROM assignment_submissions s, jsonb_array_elements(s.images) i
         WHERE s.assignment_id = $1 AND i->>'key' IS NOT NULL",
    )
    .bind(assignment_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn blob_keys_for_course(
    pool: &PgPool,
    course_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT f->>'key' FROM assignments a, jsonb_array_elements(a.files) f
         WHERE a.course_id = $1 AND f->>'key' IS NOT NULL
         UNION ALL
         SELECT i->>'key'
         FROM assignment_submissions s
         JOIN assignments a ON a.id = s.assignment_id,
         jsonb_array_elements(s.images) i
         WHERE a.course_id = $1 AND i->>'key' IS NOT NULL",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await
}
