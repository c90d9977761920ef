use crate::auth::flash::{self, Flash};
use crate::auth::session;
use crate::error::AppError;
use crate::models::User;
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

#[derive(Template, WebTemplate)]
#[template(path = "admin.html")]
struct AdminTemplate {
    users: Vec<User>,
    flashes: Vec<Flash>,
    logged_in: bool,
}

/// GET /admin - List every account. Admins only.
pub async fn admin_handler(State(state): State<AppState>, session: Session) -> Response {
    let user = match session::current_user(&session, &state.auth_service).await {
        Ok(Some(user)) => user,
        Ok(None) => return Redirect::to("/login").into_response(),
        Err(e) => return e.into_flash_redirect(&session).await,
    };

    if !user.is_admin {
        tracing::warn!(user_id = user.id, "Non-admin tried to open the admin page");
        return AppError::AccessDenied.into_flash_redirect(&session).await;
    }

    match state.user_service.list_users().await {
        Ok(users) => AdminTemplate {
            users,
            flashes: flash::take(&session).await,
            logged_in: true,
        }
        .into_response(),
        Err(e) => AppError::from(e).into_flash_redirect(&session).await,
    }
}
