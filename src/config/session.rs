use sha2::{Digest, Sha512};
use time::Duration;
use tower_sessions::{
    cookie::{Key, SameSite},
    service::SignedCookie,
    Expiry, SessionManagerLayer,
};
use tower_sessions_sqlx_store::SqliteStore;

use super::app::AppConfig;

/// Convenience alias for the signed session layer produced by `SessionConfig`.
pub type SessionLayer = SessionManagerLayer<SqliteStore, SignedCookie>;

#[derive(Clone)]
pub struct SessionConfig {
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub expiry: Duration,
    pub name: String,
    key: Key,
}

impl SessionConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        let key = session_key(config);

        if config.is_production() {
            SessionConfig {
                secure: true,
                http_only: true,
                same_site: SameSite::Strict,
                expiry: Duration::hours(2),
                name: "__Host-accountgate".to_string(),
                key,
            }
        } else {
            SessionConfig {
                secure: false,
                http_only: true,
                same_site: SameSite::Lax,
                expiry: Duration::days(7),
                name: "accountgate_session".to_string(),
                key,
            }
        }
    }

    pub fn create_layer(&self, store: SqliteStore) -> SessionLayer {
        SessionManagerLayer::new(store)
            .with_secure(self.secure)
            .with_http_only(self.http_only)
            .with_same_site(self.same_site)
            .with_name(self.name.clone())
            .with_expiry(Expiry::OnInactivity(self.expiry))
            .with_signed(self.key.clone())
    }
}

/// Cookies are signed with `SESSION_SECRET` when given, otherwise with a key
/// derived from `SECRET_KEY` so the token signer and the cookie signer never
/// share raw key material.
fn session_key(config: &AppConfig) -> Key {
    match &config.session_secret {
        Some(bytes) => key_from_secret_bytes(bytes),
        None => {
            let mut hasher = Sha512::new();
            hasher.update(b"accountgate-session-cookie");
            hasher.update(&config.secret_key);
            Key::from(hasher.finalize().as_slice())
        }
    }
}

fn key_from_secret_bytes(bytes: &[u8]) -> Key {
    if bytes.len() >= 64 {
        Key::from(&bytes[..64])
    } else {
        let digest = Sha512::digest(bytes);
        Key::from(digest.as_slice())
    }
}
