pub mod auth_service;
pub mod email_service;
pub mod password;
pub mod token_service;
pub mod user_service;

pub use auth_service::{AuthService, AuthServiceError, LoginRequest};
pub use email_service::{
    create_email_service, EmailError, EmailService, MockEmailService, SentEmail, SmtpEmailService,
};
pub use token_service::{
    EmailTokenSigner, TokenVerification, EMAIL_CONFIRM_CONTEXT, EMAIL_CONFIRM_MAX_AGE,
};
pub use user_service::{
    CreateUserRequest, RegisterRequest, RehashReport, UserService, UserServiceError,
    VerificationOutcome,
};
