use crate::config::app::verification_url;
use crate::models::user::User;
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use crate::services::email_service::{EmailError, EmailService};
use crate::services::password::{self, PasswordError};
use crate::services::token_service::{
    EmailTokenSigner, TokenError, TokenVerification, EMAIL_CONFIRM_MAX_AGE,
};
use std::sync::Arc;

/// Matches the width of the email column in earlier deployments.
const MAX_EMAIL_LENGTH: usize = 150;

pub const VERIFICATION_SUBJECT: &str = "Verify Your Email";

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Password is required")]
    MissingPassword,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,
    #[error("User not found")]
    UserNotFound,
    #[error("Verification email could not be delivered: {0}")]
    Delivery(#[from] EmailError),
    #[error(transparent)]
    Hashing(#[from] PasswordError),
    #[error("Token error: {0}")]
    Token(#[from] TokenError),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub password_confirm: Option<String>,
}

/// Out-of-band account creation used by the operator CLI.
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub email_verified: bool,
    pub is_admin: bool,
}

#[derive(Debug)]
pub enum VerificationOutcome {
    Verified(User),
    AlreadyVerified(User),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RehashReport {
    pub rehashed: usize,
    pub already_hashed: usize,
    pub skipped_bcrypt: usize,
}

pub struct UserService {
    repository: Arc<dyn UserRepository>,
    signer: Arc<EmailTokenSigner>,
    email_service: Arc<dyn EmailService>,
    base_url: String,
}

impl UserService {
    pub fn new(
        repository: Arc<dyn UserRepository>,
        signer: Arc<EmailTokenSigner>,
        email_service: Arc<dyn EmailService>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            signer,
            email_service,
            base_url: base_url.into(),
        }
    }

    /// Creates an unverified account and mails its confirmation link.
    ///
    /// The account is committed before delivery is attempted. When delivery
    /// fails the caller gets `Delivery` and the account can be confirmed later
    /// through [`UserService::resend_verification`].
    pub async fn register(&self, request: RegisterRequest) -> Result<User, UserServiceError> {
        let email = normalize_email(&request.email)?;

        if request.password.is_empty() {
            return Err(UserServiceError::MissingPassword);
        }
        if let Some(ref confirm) = request.password_confirm {
            if request.password != *confirm {
                return Err(UserServiceError::PasswordMismatch);
            }
        }

        if self.repository.find_by_email(&email).await?.is_some() {
            return Err(UserServiceError::DuplicateEmail);
        }

        let password_hash = password::hash_password(&request.password)?;

        let user = match self.repository.create_user(&email, &password_hash).await {
            Ok(user) => user,
            Err(RepositoryError::AlreadyExists) => return Err(UserServiceError::DuplicateEmail),
            Err(e) => return Err(UserServiceError::RepositoryError(e)),
        };
        tracing::info!(user_id = user.id, "Registered new account for {}", user.email);

        self.send_verification(&user).await?;

        Ok(user)
    }

    pub async fn send_verification(&self, user: &User) -> Result<(), UserServiceError> {
        let token = self.signer.issue(&user.email)?;
        let link = verification_url(&self.base_url, &token);
        let body = format!("Click the link to verify your email: {}", link);

        match self
            .email_service
            .send(&user.email, VERIFICATION_SUBJECT, &body)
            .await
        {
            Ok(()) => {
                tracing::info!("✅ Verification email sent to: {}", user.email);
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    "❌ Failed to send verification email to {}: {:?}",
                    user.email,
                    e
                );
                Err(e.into())
            }
        }
    }

    /// Confirms the address bound into `token`. Expired tokens, forged tokens
    /// and tokens for unknown addresses all report `InvalidOrExpiredToken`.
    pub async fn verify_email(&self, token: &str) -> Result<VerificationOutcome, UserServiceError> {
        let email = match self.signer.verify(token, EMAIL_CONFIRM_MAX_AGE) {
            TokenVerification::Valid(email) => email,
            TokenVerification::Expired => {
                tracing::debug!("Rejected expired verification token");
                return Err(UserServiceError::InvalidOrExpiredToken);
            }
            TokenVerification::Invalid => {
                tracing::debug!("Rejected invalid verification token");
                return Err(UserServiceError::InvalidOrExpiredToken);
            }
        };

        let mut user = self
            .repository
            .find_by_email(&email)
            .await?
            .ok_or(UserServiceError::InvalidOrExpiredToken)?;

        if user.email_verified {
            return Ok(VerificationOutcome::AlreadyVerified(user));
        }

        user.email_verified = true;
        self.repository.update_user(&user).await?;
        tracing::info!(user_id = user.id, "Email verified for {}", user.email);

        Ok(VerificationOutcome::Verified(user))
    }

    /// Sends a fresh confirmation link when `email` belongs to an unverified
    /// account. Returns whether a message went out.
    pub async fn resend_verification(&self, email: &str) -> Result<bool, UserServiceError> {
        let email = normalize_email(email)?;

        match self.repository.find_by_email(&email).await? {
            Some(user) if !user.email_verified => {
                self.send_verification(&user).await?;
                Ok(true)
            }
            Some(_) => {
                tracing::debug!("Resend requested for already verified account");
                Ok(false)
            }
            None => Ok(false),
        }
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, UserServiceError> {
        let email = normalize_email(&request.email)?;
        if request.password.is_empty() {
            return Err(UserServiceError::MissingPassword);
        }

        let password_hash = password::hash_password(&request.password)?;
        let mut user = match self.repository.create_user(&email, &password_hash).await {
            Ok(user) => user,
            Err(RepositoryError::AlreadyExists) => return Err(UserServiceError::DuplicateEmail),
            Err(e) => return Err(UserServiceError::RepositoryError(e)),
        };

        if request.email_verified || request.is_admin {
            user.email_verified = request.email_verified;
            user.is_admin = request.is_admin;
            self.repository.update_user(&user).await?;
        }

        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_email(email.trim()).await?)
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_id(id).await?)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, UserServiceError> {
        Ok(self.repository.list_users().await?)
    }

    pub async fn mark_verified(&self, email: &str) -> Result<VerificationOutcome, UserServiceError> {
        let mut user = self.require_user(email).await?;
        if user.email_verified {
            return Ok(VerificationOutcome::AlreadyVerified(user));
        }

        user.email_verified = true;
        self.repository.update_user(&user).await?;
        Ok(VerificationOutcome::Verified(user))
    }

    pub async fn set_admin(&self, email: &str, is_admin: bool) -> Result<User, UserServiceError> {
        let mut user = self.require_user(email).await?;
        user.is_admin = is_admin;
        self.repository.update_user(&user).await?;
        tracing::info!(user_id = user.id, is_admin, "Admin flag updated");
        Ok(user)
    }

    pub async fn update_password(
        &self,
        email: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        if new_password.is_empty() {
            return Err(UserServiceError::MissingPassword);
        }

        let mut user = self.require_user(email).await?;
        user.password_hash = password::hash_password(new_password)?;
        self.repository.update_user(&user).await?;
        Ok(())
    }

    /// Replaces legacy plaintext passwords with Argon2 hashes, one update per
    /// user. PHC strings are left untouched. bcrypt digests are counted and
    /// upgraded by `AuthService::authenticate` at the owner's next login.
    pub async fn rehash_legacy_passwords(&self) -> Result<RehashReport, UserServiceError> {
        let mut report = RehashReport::default();

        for mut user in self.repository.list_users().await? {
            if password::is_password_hash(&user.password_hash) {
                report.already_hashed += 1;
                continue;
            }
            if password::is_bcrypt_hash(&user.password_hash) {
                tracing::info!(user_id = user.id, "bcrypt hash left for upgrade at next login");
                report.skipped_bcrypt += 1;
                continue;
            }

            user.password_hash = password::hash_password(&user.password_hash)?;
            self.repository.update_user(&user).await?;
            tracing::info!(user_id = user.id, "Rehashed legacy password");
            report.rehashed += 1;
        }

        Ok(report)
    }

    async fn require_user(&self, email: &str) -> Result<User, UserServiceError> {
        self.repository
            .find_by_email(email.trim())
            .await?
            .ok_or(UserServiceError::UserNotFound)
    }
}

fn normalize_email(email: &str) -> Result<String, UserServiceError> {
    let email = email.trim();
    let valid_shape = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());

    if !valid_shape || email.len() > MAX_EMAIL_LENGTH || email.contains(char::is_whitespace) {
        return Err(UserServiceError::InvalidEmail);
    }
    Ok(email.to_string())
}
