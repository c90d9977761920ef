//! Binding between a browser session and an authenticated user.

use tower_sessions::Session;

use crate::error::AppError;
use crate::models::User;
use crate::services::{AuthService, AuthServiceError};

pub const USER_ID_KEY: &str = "user_id";
pub const AUTH_TIMESTAMP_KEY: &str = "auth_timestamp";

/// Binds `user` to the session. The session id is rotated first so an id
/// planted before login cannot be reused afterwards.
pub async fn start(session: &Session, user: &User) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(USER_ID_KEY, user.id).await?;
    session
        .insert(AUTH_TIMESTAMP_KEY, chrono::Utc::now().timestamp())
        .await?;
    tracing::info!(user_id = user.id, "Session started");
    Ok(())
}

pub async fn end(session: &Session) -> Result<(), tower_sessions::session::Error> {
    if let Ok(Some(user_id)) = current_user_id(session).await {
        tracing::info!(user_id, "Session ended");
    }
    session.flush().await
}

pub async fn current_user_id(
    session: &Session,
) -> Result<Option<i64>, tower_sessions::session::Error> {
    session.get::<i64>(USER_ID_KEY).await
}

/// Resolves the bound user id against the store. A session pointing at a
/// user that no longer exists is cleared.
pub async fn current_user(
    session: &Session,
    auth_service: &AuthService,
) -> Result<Option<User>, AppError> {
    let Some(user_id) = current_user_id(session).await? else {
        return Ok(None);
    };

    match auth_service.get_user_by_id(user_id).await {
        Ok(user) => Ok(Some(user)),
        Err(AuthServiceError::UserNotFound) => {
            tracing::warn!(user_id, "Session bound to missing user; clearing it");
            session.flush().await?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
