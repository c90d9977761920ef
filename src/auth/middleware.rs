use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use super::session::current_user_id;

pub async fn require_auth(session: Session, request: Request, next: Next) -> Response {
    if let Ok(Some(_user_id)) = current_user_id(&session).await {
        next.run(request).await
    } else {
        Redirect::to("/login").into_response()
    }
}

pub async fn redirect_if_authenticated(session: Session, request: Request, next: Next) -> Response {
    if let Ok(Some(_user_id)) = current_user_id(&session).await {
        Redirect::to("/profile").into_response()
    } else {
        next.run(request).await
    }
}
