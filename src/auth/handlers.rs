use crate::auth::flash::{self, Flash, FlashLevel};
use crate::auth::session;
use crate::error::AppError;
use crate::middleware::csrf::{get_or_create_csrf_token, validate_csrf_form_field};
use crate::services::{LoginRequest, RegisterRequest, VerificationOutcome};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Form, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

const CSRF_ERROR: &str = "Invalid security token. Please refresh the page and try again.";

#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
struct RegisterTemplate {
    error: Option<String>,
    email: String,
    csrf_token: String,
    flashes: Vec<Flash>,
    logged_in: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
struct LoginTemplate {
    error: Option<String>,
    csrf_token: String,
    flashes: Vec<Flash>,
    logged_in: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/resend_verification.html")]
struct ResendTemplate {
    error: Option<String>,
    csrf_token: String,
    flashes: Vec<Flash>,
    logged_in: bool,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    email: String,
    password: String,
    password_confirm: Option<String>,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct ResendForm {
    email: String,
    csrf_token: String,
}

async fn csrf_token_for(session: &Session) -> String {
    get_or_create_csrf_token(session)
        .await
        .unwrap_or_else(|_| String::from("error"))
}

async fn render_register(session: &Session, error: Option<String>, email: String) -> Response {
    RegisterTemplate {
        error,
        email,
        csrf_token: csrf_token_for(session).await,
        flashes: flash::take(session).await,
        logged_in: false,
    }
    .into_response()
}

async fn render_login(session: &Session, error: Option<String>) -> Response {
    LoginTemplate {
        error,
        csrf_token: csrf_token_for(session).await,
        flashes: flash::take(session).await,
        logged_in: false,
    }
    .into_response()
}

async fn render_resend(session: &Session, error: Option<String>) -> Response {
    let logged_in = matches!(session::current_user_id(session).await, Ok(Some(_)));
    ResendTemplate {
        error,
        csrf_token: csrf_token_for(session).await,
        flashes: flash::take(session).await,
        logged_in,
    }
    .into_response()
}

/// GET /register
pub async fn register_page(session: Session) -> Response {
    render_register(&session, None, String::new()).await
}

/// POST /register
pub async fn register_handler(
    State(app_state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Response {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        return render_register(&session, Some(CSRF_ERROR.to_string()), form.email).await;
    }

    let request = RegisterRequest {
        email: form.email.clone(),
        password: form.password,
        password_confirm: form.password_confirm.filter(|confirm| !confirm.is_empty()),
    };

    match app_state.user_service.register(request).await {
        Ok(_) => {
            flash::redirect(
                &session,
                FlashLevel::Info,
                "A verification email has been sent!",
                "/login",
            )
            .await
        }
        Err(err) => match AppError::from(err) {
            AppError::Validation(msg) => render_register(&session, Some(msg), form.email).await,
            other => other.into_flash_redirect(&session).await,
        },
    }
}

/// GET /verify_email/{token}
///
/// Every outcome ends on the login page; only the notice differs.
pub async fn verify_email_handler(
    State(app_state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
) -> Response {
    match app_state.user_service.verify_email(&token).await {
        Ok(VerificationOutcome::Verified(_)) => {
            flash::redirect(
                &session,
                FlashLevel::Success,
                "Email verified successfully! You can now log in.",
                "/login",
            )
            .await
        }
        Ok(VerificationOutcome::AlreadyVerified(_)) => {
            flash::redirect(
                &session,
                FlashLevel::Info,
                "Your email is already verified. Please log in.",
                "/login",
            )
            .await
        }
        Err(err) => {
            AppError::from(err)
                .into_flash_redirect_to(&session, "/login")
                .await
        }
    }
}

/// GET /login
pub async fn login_page(session: Session) -> Response {
    render_login(&session, None).await
}

/// POST /login
pub async fn login_handler(
    State(app_state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        return render_login(&session, Some(CSRF_ERROR.to_string())).await;
    }

    let request = LoginRequest {
        email: form.email,
        password: form.password,
    };

    match app_state.auth_service.authenticate(request).await {
        Ok(user) => {
            if let Err(e) = session::start(&session, &user).await {
                return AppError::from(e)
                    .into_flash_redirect_to(&session, "/login")
                    .await;
            }
            Redirect::to("/profile").into_response()
        }
        Err(err) => AppError::from(err).into_flash_redirect(&session).await,
    }
}

/// GET /logout
pub async fn logout_handler(session: Session) -> impl IntoResponse {
    if let Err(e) = session::end(&session).await {
        tracing::warn!("Failed to clear session on logout: {}", e);
    }
    Redirect::to("/")
}

/// GET /resend_verification
pub async fn resend_verification_page(session: Session) -> Response {
    render_resend(&session, None).await
}

/// POST /resend_verification
///
/// The notice is the same whether or not the address is known.
pub async fn resend_verification_handler(
    State(app_state): State<AppState>,
    session: Session,
    Form(form): Form<ResendForm>,
) -> Response {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        return render_resend(&session, Some(CSRF_ERROR.to_string())).await;
    }

    match app_state.user_service.resend_verification(&form.email).await {
        Ok(_) => {
            flash::redirect(
                &session,
                FlashLevel::Info,
                "If an unverified account exists for that address, a new verification link has been sent.",
                "/login",
            )
            .await
        }
        Err(err) => match AppError::from(err) {
            AppError::Validation(msg) => render_resend(&session, Some(msg)).await,
            other => other.into_flash_redirect(&session).await,
        },
    }
}
