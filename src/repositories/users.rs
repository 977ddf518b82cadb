use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::models::User;
use crate::db::types::UserRole;

const COLUMNS: &str = "\
    id, username, hashed_password, full_name, email, phone, parent_phone, school, grade, \
    role, privacy_consent, marketing_consent, is_active, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE username = $1"))
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn exists_by_username(pool: &PgPool, username: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
        .bind(username)
        .fetch_one(pool)
        .await
}

pub(crate) struct CreateUser<'a> {
    pub(crate) id: &'a str,
    pub(crate) username: &'a str,
    pub(crate) hashed_password: String,
    pub(crate) full_name: &'a str,
    pub(crate) email: Option<&'a str>,
    pub(crate) phone: Option<&'a str>,
    pub(crate) parent_phone: Option<&'a str>,
    pub(crate) school: Option<&'a str>,
    pub(crate) grade: Option<&'a str>,
    pub(crate) role: UserRole,
    pub(crate) privacy_consent: bool,
    pub(crate) marketing_consent: bool,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateUser<'_>) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (
            id, username, hashed_password, full_name, email, phone, parent_phone,
            school, grade, role, privacy_consent, marketing_consent, is_active,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,TRUE,$13,$13)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.username)
    .bind(params.hashed_password)
    .bind(params.full_name)
    .bind(params.email)
    .bind(params.phone)
    .bind(params.parent_phone)
    .bind(params.school)
    .bind(params.grade)
    .bind(params.role)
    .bind(params.privacy_consent)
    .bind(params.marketing_consent)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

/// Partial update; `None` keeps the stored value.
#[derive(Default)]
pub(crate) struct UpdateUser {
    pub(crate) full_name: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) phone: Option<String>,
    pub(crate) parent_phone: Option<String>,
    pub(crate) school: Option<String>,
    pub(crate) grade: Option<String>,
    pub(crate) role: Option<UserRole>,
    pub(crate) privacy_consent: Option<bool>,
    pub(crate) marketing_consent: Option<bool>,
    pub(crate) is_active: Option<bool>,
    pub(crate) hashed_password: Option<String>,
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    params: UpdateUser,
    updated_at: time::PrimitiveDateTime,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET
            full_name = COALESCE($1, full_name),
            email = COALESCE($2, email),
            phone = COALESCE($3, phone),
            parent_phone = COALESCE($4, parent_phone),
            school = COALESCE($5, school),
            grade = COALESCE($6, grade),
            role = COALESCE($7, role),
            privacy_consent = COALESCE($8, privacy_consent),
            marketing_consent = COALESCE($9, marketing_consent),
            is_active = COALESCE($10, is_active),
            hashed_password = COALESCE($11, hashed_password),
            updated_at = $12
         WHERE id = $13
         RETURNING {COLUMNS}",
    ))
    .bind(params.full_name)
    .bind(params.email)
    .bind(params.phone)
    .bind(params.parent_phone)
    .bind(params.school)
    .bind(params.grade)
    .bind(params.role)
    .bind(params.privacy_consent)
    .bind(params.marketing_consent)
    .bind(params.is_active)
    .bind(params.hashed_password)
    .bind(updated_at)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Default)]
pub(crate) struct ListUsers {
    pub(crate) role: Option<UserRole>,
    pub(crate) search: Option<String>,
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &ListUsers) {
    builder.push(" WHERE 1=1");
    if let Some(role) = filter.role {
        // legacy rows without a role count as students
        if role == UserRole::Student {
            builder.push(" AND (role = ").push_bind(role).push(" OR role IS NULL)");
        } else {
            builder.push(" AND role = ").push_bind(role);
        }
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        builder
            .push(" AND (username ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR full_name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub(crate) async fn list(
    pool: &PgPool,
    filter: &ListUsers,
    skip: i64,
    limit: i64,
) -> Result<Vec<User>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM users"));
    push_filters(&mut builder, filter);
    builder
        .push(" ORDER BY created_at DESC, id ASC OFFSET ")
        .push_bind(skip)
        .push(" LIMIT ")
        .push_bind(limit);

    builder.build_query_as::<User>().fetch_all(pool).await
}

pub(crate) async fn count(pool: &PgPool, filter: &ListUsers) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
    push_filters(&mut builder, filter);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}
