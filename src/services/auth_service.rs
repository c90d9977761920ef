use crate::models::user::User;
use crate::repositories::user_repository::UserRepository;
use crate::services::password;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    /// Unknown email and wrong password are deliberately the same error.
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Account not verified")]
    EmailNotVerified,
    #[error("User not found")]
    UserNotFound,
    #[error("Repository error: {0}")]
    RepositoryError(#[from] crate::repositories::user_repository::RepositoryError),
}

pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub struct AuthService {
    user_repository: Arc<dyn UserRepository>,
}

impl AuthService {
    pub fn new(user_repository: Arc<dyn UserRepository>) -> Self {
        Self { user_repository }
    }

    pub async fn authenticate(&self, request: LoginRequest) -> Result<User, AuthServiceError> {
        let Some(mut user) = self
            .user_repository
            .find_by_email(request.email.trim())
            .await?
        else {
            // Same hashing cost as a wrong password
            password::verify_dummy(&request.password);
            return Err(AuthServiceError::InvalidCredentials);
        };

        // Verify password
        if !password::verify_password(&request.password, &user.password_hash) {
            return Err(AuthServiceError::InvalidCredentials);
        }

        // Credentials are correct, but the address is still unconfirmed
        if !user.can_authenticate() {
            return Err(AuthServiceError::EmailNotVerified);
        }

        if password::is_bcrypt_hash(&user.password_hash) {
            self.upgrade_bcrypt_hash(&mut user, &request.password).await;
        }

        Ok(user)
    }

    /// Replaces a bcrypt digest with Argon2id. A failed upgrade does not
    /// block the login; the next one retries.
    async fn upgrade_bcrypt_hash(&self, user: &mut User, plaintext: &str) {
        let new_hash = match password::hash_password(plaintext) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(user_id = user.id, "Could not rehash bcrypt password: {}", e);
                return;
            }
        };

        let previous = std::mem::replace(&mut user.password_hash, new_hash);
        match self.user_repository.update_user(user).await {
            Ok(()) => tracing::info!(user_id = user.id, "Upgraded bcrypt password to Argon2id"),
            Err(e) => {
                tracing::warn!(user_id = user.id, "Could not store upgraded password: {}", e);
                user.password_hash = previous;
            }
        }
    }

    pub async fn get_user_by_id(&self, user_id: i64) -> Result<User, AuthServiceError> {
        self.user_repository
            .find_by_id(user_id)
            .await?
            .ok_or(AuthServiceError::UserNotFound)
    }
}
