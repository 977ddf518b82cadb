use uuid::Uuid;

use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;

/// Makes sure the configured bootstrap account exists, is active and holds the admin role.
pub(crate) async fn ensure_admin(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_admin_password.is_empty() {
        tracing::warn!("FIRST_ADMIN_PASSWORD not configured; skipping admin bootstrap");
        return Ok(());
    }

    let username = admin.first_admin_username.as_str();
    let now = primitive_now_utc();

    if let Some(user) = repositories::users::find_by_username(state.db(), username).await? {
        let password_matches =
            security::verify_password(&admin.first_admin_password, &user.hashed_password)
                .unwrap_or(false);

        let mut changes = repositories::users::UpdateUser::default();
        if !password_matches {
            changes.hashed_password = Some(security::hash_password(&admin.first_admin_password)?);
        }
        if user.role != Some(UserRole::Admin) {
            changes.role = Some(UserRole::Admin);
        }
        if !user.is_active {
            changes.is_active = Some(true);
        }

        let needs_update = changes.hashed_password.is_some()
            || changes.role.is_some()
            || changes.is_active.is_some();

        if needs_update {
            repositories::users::update(state.db(), &user.id, changes, now).await?;
            tracing::info!(username, "Updated bootstrap admin");
        } else {
            tracing::debug!(username, "Bootstrap admin already up to date");
        }
        return Ok(());
    }

    let hashed_password = security::hash_password(&admin.first_admin_password)?;
    repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            username,
            hashed_password,
            full_name: "Administrator",
            email: None,
            phone: None,
            parent_phone: None,
            school: None,
            grade: None,
            role: UserRole::Admin,
            privacy_consent: true,
            marketing_consent: false,
            created_at: now,
        },
    )
    .await?;

    tracing::info!(username, "Created bootstrap admin");
    Ok(())
}
