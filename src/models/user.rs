use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email_verified: bool,
    pub is_admin: bool,
    pub created_at: Option<String>,
}

impl User {
    /// Login is refused until the address has been confirmed.
    pub fn can_authenticate(&self) -> bool {
        self.email_verified
    }

    pub fn created_display(&self) -> &str {
        self.created_at.as_deref().unwrap_or("N/A")
    }
}
