pub mod test_helpers {
    use crate::config::AppConfig;
    use crate::services::{EmailService, MockEmailService};
    use crate::AppState;
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use std::sync::Arc;

    /// Signing key shared by tests that need to mint their own tokens.
    pub const TEST_SECRET_KEY: &str = "test-secret-key-with-at-least-32-bytes-of-entropy";

    pub const TEST_BASE_URL: &str = "http://localhost:8080";

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Insert a test user with hashed password
    pub async fn insert_test_user(
        pool: &SqlitePool,
        email: &str,
        password: &str,
        verified: bool,
        is_admin: bool,
    ) -> Result<i64, sqlx::Error> {
        let password_hash = crate::services::password::hash_password(password).map_err(|e| {
            sqlx::Error::Configuration(format!("Password hashing failed: {}", e).into())
        })?;

        insert_raw_user(pool, email, &password_hash, verified, is_admin).await
    }

    /// Insert a user with `password_hash` stored exactly as given, e.g. a
    /// legacy plaintext value.
    pub async fn insert_raw_user(
        pool: &SqlitePool,
        email: &str,
        password_hash: &str,
        verified: bool,
        is_admin: bool,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (email, password_hash, email_verified, is_admin) VALUES (?, ?, ?, ?)",
        )
        .bind(email)
        .bind(password_hash)
        .bind(verified)
        .bind(is_admin)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Development configuration with a fixed signing key and no SMTP.
    pub fn test_config() -> AppConfig {
        AppConfig::from_lookup(|key| match key {
            "SECRET_KEY" => Some(TEST_SECRET_KEY.to_string()),
            "BASE_URL" => Some(TEST_BASE_URL.to_string()),
            _ => None,
        })
        .unwrap_or_else(|e| panic!("test config must be valid: {}", e))
    }

    /// Application state backed by `pool` whose outgoing mail lands in the
    /// returned outbox.
    pub fn test_app_state(pool: SqlitePool) -> (AppState, Arc<MockEmailService>) {
        let outbox = Arc::new(MockEmailService::new());
        let state = test_app_state_with_mailer(pool, outbox.clone());
        (state, outbox)
    }

    pub fn test_app_state_with_mailer(
        pool: SqlitePool,
        email_service: Arc<dyn EmailService>,
    ) -> AppState {
        AppState::new(pool, &test_config(), email_service)
    }
}

// Re-export commonly used test functions at module level for convenience
// Note: This is test-only code. Panic on error is acceptable in tests.
#[cfg(test)]
pub async fn create_test_pool() -> sqlx::SqlitePool {
    match test_helpers::create_test_db().await {
        Ok(pool) => pool,
        Err(e) => panic!("Failed to create test pool: {}", e),
    }
}

#[cfg(test)]
pub async fn create_test_user(
    pool: &sqlx::SqlitePool,
    email: &str,
    password: &str,
) -> Result<i64, sqlx::Error> {
    test_helpers::insert_test_user(pool, email, password, true, false).await
}
