use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::validation::{validate_password_len, validate_username};
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::is_unique_violation;
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::auth::{LoginRequest, RegisterRequest, TokenResponse};
use crate::schemas::user::UserResponse;

/// Max attempts per window for login/register.
const AUTH_RATE_LIMIT: u64 = 10;
const AUTH_RATE_WINDOW_SECONDS: u64 = 60;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

pub(crate) async fn enforce_rate_limit(
    state: &AppState,
    key: &str,
    limit: u64,
    window_seconds: u64,
    message: &'static str,
) -> Result<(), ApiError> {
    let allowed = match state.redis().rate_limit(key, limit, window_seconds).await {
        Ok(allowed) => allowed,
        Err(err) => {
            tracing::warn!(error = %err, key, "Rate limit check failed; allowing request");
            true
        }
    };
    if allowed {
        Ok(())
    } else {
        Err(ApiError::TooManyRequests(message))
    }
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    validate_username(&payload.username)?;
    validate_password_len(&payload.password)?;

    enforce_rate_limit(
        &state,
        &format!("rl:register:{}", payload.username),
        AUTH_RATE_LIMIT,
        AUTH_RATE_WINDOW_SECONDS,
        "Too many registration attempts, try again later",
    )
    .await?;

    if !payload.privacy_consent {
        return Err(ApiError::BadRequest("Privacy consent is required".to_string()));
    }

    let existing = repositories::users::exists_by_username(state.db(), &payload.username)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing user"))?;
    if existing {
        return Err(ApiError::Conflict("Username is already taken".to_string()));
    }

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    let user = repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            username: &payload.username,
            hashed_password,
            full_name: payload.full_name.trim(),
            email: payload.email.as_deref(),
            phone: payload.phone.as_deref(),
            parent_phone: payload.parent_phone.as_deref(),
            school: payload.school.as_deref(),
            grade: payload.grade.as_deref(),
            role: UserRole::Student,
            privacy_consent: true,
            marketing_consent: payload.marketing_consent,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("Username is already taken".to_string())
        } else {
            ApiError::internal(e, "Failed to create user")
        }
    })?;

    tracing::info!(user_id = %user.id, username = %user.username, "Student registered");

    let response = issue_token(&state, user)?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    enforce_rate_limit(
        &state,
        &format!("rl:login:{}", payload.username),
        AUTH_RATE_LIMIT,
        AUTH_RATE_WINDOW_SECONDS,
        "Too many login attempts, try again later",
    )
    .await?;

    let user = repositories::users::find_by_username(state.db(), &payload.username)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or(ApiError::Unauthorized("Incorrect username or password"))?;

    let verified = security::verify_password(&payload.password, &user.hashed_password)
        .map_err(|_| ApiError::Unauthorized("Incorrect username or password"))?;
    if !verified {
        return Err(ApiError::Unauthorized("Incorrect username or password"));
    }

    if !user.is_active {
        return Err(ApiError::BadRequest("Inactive user".to_string()));
    }

    Ok(Json(issue_token(&state, user)?))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from_db(user))
}

fn issue_token(state: &AppState, user: User) -> Result<TokenResponse, ApiError> {
    let access_token = security::create_access_token(&user.id, user.role, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    Ok(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        user: UserResponse::from_db(user),
    })
}
