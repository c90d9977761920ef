use crate::auth::flash::{self, Flash};
use crate::auth::session;
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tower_sessions::Session;

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
struct IndexTemplate {
    user_email: Option<String>,
    flashes: Vec<Flash>,
    logged_in: bool,
}

/// GET / - Landing page
pub async fn index_handler(State(state): State<AppState>, session: Session) -> impl IntoResponse {
    let user = match session::current_user(&session, &state.auth_service).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("Could not resolve session user: {}", e);
            None
        }
    };

    IndexTemplate {
        logged_in: user.is_some(),
        user_email: user.map(|u| u.email),
        flashes: flash::take(&session).await,
    }
}
