use crate::auth::flash::{self, Flash};
use crate::auth::session;
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
#[template(path = "profile.html")]
struct ProfileTemplate {
    user: User,
    flashes: Vec<Flash>,
    logged_in: bool,
}

/// GET /profile - Show the logged-in user
pub async fn profile_handler(State(state): State<AppState>, session: Session) -> Response {
    match session::current_user(&session, &state.auth_service).await {
        Ok(Some(user)) => ProfileTemplate {
            user,
            flashes: flash::take(&session).await,
            logged_in: true,
        }
        .into_response(),
        Ok(None) => Redirect::to("/login").into_response(),
        Err(e) => e.into_flash_redirect(&session).await,
    }
}
