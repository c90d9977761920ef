pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::repositories::SqliteUserRepository;
use crate::services::{AuthService, EmailService, EmailTokenSigner, UserService};

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub auth_service: Arc<AuthService>,
    /// Enables production-only response hardening such as HSTS.
    pub production: bool,
}

impl AppState {
    pub fn new(
        pool: sqlx::SqlitePool,
        config: &AppConfig,
        email_service: Arc<dyn EmailService>,
    ) -> Self {
        let user_repository = Arc::new(SqliteUserRepository::new(pool));
        let signer = Arc::new(EmailTokenSigner::new(config.secret_key.clone()));

        let user_service = Arc::new(UserService::new(
            user_repository.clone(),
            signer,
            email_service,
            config.base_url.clone(),
        ));
        let auth_service = Arc::new(AuthService::new(user_repository));

        Self {
            user_service,
            auth_service,
            production: config.is_production(),
        }
    }
}
