use axum::{middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{auth, handlers, AppState};

/// Builds the application router. The caller adds the session layer on top,
/// since every handler below extracts a `Session`.
pub fn build_router(state: AppState) -> Router {
    // Routes that need a logged-in user
    let protected_routes = Router::new()
        .route("/profile", get(handlers::profile_handler))
        .route("/admin", get(handlers::admin_handler))
        .route("/logout", get(auth::handlers::logout_handler))
        .route_layer(middleware::from_fn(auth::middleware::require_auth));

    // Login and registration are pointless once logged in
    let guest_routes = Router::new()
        .route(
            "/register",
            get(auth::handlers::register_page).post(auth::handlers::register_handler),
        )
        .route(
            "/login",
            get(auth::handlers::login_page).post(auth::handlers::login_handler),
        )
        .route_layer(middleware::from_fn(
            auth::middleware::redirect_if_authenticated,
        ));

    Router::new()
        .route("/", get(handlers::index_handler))
        .route(
            "/verify_email/{token}",
            get(auth::handlers::verify_email_handler),
        )
        .route(
            "/resend_verification",
            get(auth::handlers::resend_verification_page)
                .post(auth::handlers::resend_verification_handler),
        )
        .merge(guest_routes)
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    crate::middleware::add_security_headers,
                )),
        )
        .with_state(state)
}
