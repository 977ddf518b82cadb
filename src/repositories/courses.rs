use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::models::Course;

const COURSE_COLUMNS: &str = "id, name, description, teacher_id, created_at, updated_at";

pub(crate) struct CreateCourse<'a> {
    pub(crate) id: &'a str,
    pub(crate) name: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) teacher_id: &'a str,
    pub(crate) created_at: time::PrimitiveDateTime,
}

#[derive(Default)]
pub(crate) struct UpdateCourse {
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) teacher_id: Option<String>,
}

/// Which courses a caller may list.
#[derive(Debug, Clone, Copy)]
pub(crate) enum CourseScope<'a> {
    All,
    TaughtBy(&'a str),
    EnrolledStudent(&'a str),
}

pub(crate) async fn create(pool: &PgPool, params: CreateCourse<'_>) -> Result<Course, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "INSERT INTO courses (id, name, description, teacher_id, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5,$5)
         RETURNING {COURSE_COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.name)
    .bind(params.description)
    .bind(params.teacher_id)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    course_id: &str,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"))
        .bind(course_id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn update(
    pool: &PgPool,
    course_id: &str,
    params: UpdateCourse,
    updated_at: time::PrimitiveDateTime,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "UPDATE courses SET
            name = COALESCE($1, name),
            description = COALESCE($2, description),
            teacher_id = COALESCE($3, teacher_id),
            updated_at = $4
         WHERE id = $5
         RETURNING {COURSE_COLUMNS}",
    ))
    .bind(params.name)
    .bind(params.description)
    .bind(params.teacher_id)
    .bind(updated_at)
    .bind(course_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete(pool: &PgPool, course_id: &str) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM courses WHERE id = $1").bind(course_id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

fn push_scope(builder: &mut QueryBuilder<'_, Postgres>, scope: CourseScope<'_>) {
    match scope {
        CourseScope::All => {}
        CourseScope::TaughtBy(teacher_id) => {
            builder.push(" WHERE c.teacher_id = ").push_bind(teacher_id.to_string());
        }
        CourseScope::EnrolledStudent(student_id) => {
            builder
                .push(
                    " WHERE EXISTS (SELECT 1 FROM course_students cs \
                     WHERE cs.course_id = c.id AND cs.student_id = ",
                )
                .push_bind(student_id.to_string())
                .push(")");
        }
    }
}

pub(crate) async fn list(
    pool: &PgPool,
    scope: CourseScope<'_>,
    skip: i64,
    limit: i64,
) -> Result<Vec<Course>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT c.id, c.name, c.description, c.teacher_id, c.created_at, c.updated_at \
         FROM courses c",
    );
    push_scope(&mut builder, scope);
    builder.push(" ORDER BY c.name ASC OFFSET ").push_bind(skip).push(" LIMIT ").push_bind(limit);

    builder.build_query_as::<Course>().fetch_all(pool).await
}

pub(crate) async fn count(pool: &PgPool, scope: CourseScope<'_>) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM courses c");
    push_scope(&mut builder, scope);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

/// Fails with a unique violation when the student is already enrolled.
pub(crate) async fn enroll(
    pool: &PgPool,
    course_id: &str,
    student_id: &str,
    enrolled_at: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO course_students (course_id, student_id, enrolled_at) VALUES ($1, $2, $3)",
    )
    .bind(course_id)
    .bind(student_id)
    .bind(enrolled_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn unenroll(
    pool: &PgPool,
    course_id: &str,
    student_id: &str,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM course_students WHERE course_id = $1 AND student_id = $2")
            .bind(course_id)
            .bind(student_id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn is_enrolled(
    pool: &PgPool,
    course_id: &str,
    student_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(
            SELECT 1 FROM course_students WHERE course_id = $1 AND student_id = $2
        )",
    )
    .bind(course_id)
    .bind(student_id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn student_ids(pool: &PgPool, course_id: &str) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT student_id FROM course_students
         WHERE course_id = $1
         ORDER BY enrolled_at ASC, student_id ASC",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await
}

/// Earliest enrollment wins; course id breaks ties so the choice is stable. `taught_by`
/// limits the candidates to one teacher's courses.
pub(crate) async fn first_enrolled_course(
    pool: &PgPool,
    student_id: &str,
    taught_by: Option<&str>,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        "SELECT c.id, c.name, c.description, c.teacher_id, c.created_at, c.updated_at
         FROM course_students cs
         JOIN courses c ON c.id = cs.course_id
         WHERE cs.student_id = $1 AND ($2::text IS NULL OR c.teacher_id = $2)
         ORDER BY cs.enrolled_at ASC, cs.course_id ASC
         LIMIT 1",
    )
    .bind(student_id)
    .bind(taught_by)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn teaches_student(
    pool: &PgPool,
    teacher_id: &str,
    student_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(
            SELECT 1 FROM course_students cs
            JOIN courses c ON c.id = cs.course_id
            WHERE c.teacher_id = $1 AND cs.student_id = $2
        )",
    )
    .bind(teacher_id)
    .bind(student_id)
    .fetch_one(pool)
    .await
}
