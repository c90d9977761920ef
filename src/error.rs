use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tower_sessions::Session;

use crate::auth::flash::{self, FlashLevel};
use crate::services::{AuthServiceError, UserServiceError};

/// Failures a request handler can run into. Handlers turn every one of them
/// into a flash notice plus a redirect to a safe page.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account not verified")]
    UnverifiedAccount,

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Access denied")]
    AccessDenied,

    #[error("Email delivery failed: {0}")]
    Delivery(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The notice shown to the user. Internal details never leave the server.
    pub fn notice(&self) -> (FlashLevel, String) {
        let (level, message) = match self {
            AppError::DuplicateEmail => (
                FlashLevel::Warning,
                "Email already registered. Please log in.",
            ),
            AppError::InvalidCredentials => (FlashLevel::Danger, "Invalid email or password."),
            AppError::UnverifiedAccount => (FlashLevel::Warning, "Please verify your email first."),
            AppError::InvalidOrExpiredToken => (FlashLevel::Danger, "Invalid or expired token."),
            AppError::AccessDenied => (FlashLevel::Danger, "Access denied! You are not an admin."),
            AppError::Delivery(_) => (
                FlashLevel::Warning,
                "We could not send your verification email. Request a new link below.",
            ),
            AppError::Validation(msg) => return (FlashLevel::Danger, msg.clone()),
            AppError::Session(_) | AppError::Internal(_) => (
                FlashLevel::Danger,
                "Something went wrong. Please try again.",
            ),
        };
        (level, message.to_string())
    }

    /// The page the user lands on after the notice.
    pub fn redirect_to(&self) -> &'static str {
        match self {
            AppError::DuplicateEmail
            | AppError::InvalidCredentials
            | AppError::UnverifiedAccount
            | AppError::InvalidOrExpiredToken => "/login",
            AppError::Delivery(_) => "/resend_verification",
            AppError::AccessDenied
            | AppError::Validation(_)
            | AppError::Session(_)
            | AppError::Internal(_) => "/",
        }
    }

    fn is_internal(&self) -> bool {
        matches!(
            self,
            AppError::Session(_) | AppError::Internal(_) | AppError::Delivery(_)
        )
    }

    /// Flashes the notice and redirects to [`AppError::redirect_to`].
    pub async fn into_flash_redirect(self, session: &Session) -> Response {
        let target = self.redirect_to();
        self.into_flash_redirect_to(session, target).await
    }

    pub async fn into_flash_redirect_to(self, session: &Session, target: &str) -> Response {
        if self.is_internal() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let (level, message) = self.notice();
        flash::redirect(session, level, message, target).await
    }
}

impl From<UserServiceError> for AppError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::DuplicateEmail => AppError::DuplicateEmail,
            UserServiceError::InvalidOrExpiredToken => AppError::InvalidOrExpiredToken,
            UserServiceError::InvalidEmail
            | UserServiceError::MissingPassword
            | UserServiceError::PasswordMismatch => AppError::Validation(err.to_string()),
            UserServiceError::Delivery(e) => AppError::Delivery(e.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<AuthServiceError> for AppError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::InvalidCredentials => AppError::InvalidCredentials,
            AuthServiceError::EmailNotVerified => AppError::UnverifiedAccount,
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Fallback for errors that escape a handler without a session at hand.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidCredentials | AppError::UnverifiedAccount => StatusCode::UNAUTHORIZED,
            AppError::AccessDenied => StatusCode::FORBIDDEN,
            AppError::DuplicateEmail => StatusCode::CONFLICT,
            AppError::InvalidOrExpiredToken | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Delivery(_) | AppError::Session(_) | AppError::Internal(_) => {
                tracing::error!("Unhandled request error: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let (_, message) = self.notice();
        (status, message).into_response()
    }
}
