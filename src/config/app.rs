use std::{env, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use tracing::warn;

/// Minimum length of `SECRET_KEY` once decoded, enforced in production.
pub const MIN_SECRET_KEY_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("Insecure production configuration: {0}")]
    Insecure(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpEncryption {
    Tls,
    StartTls,
    None,
}

impl SmtpEncryption {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "tls" => Ok(Self::Tls),
            "starttls" => Ok(Self::StartTls),
            "none" => Ok(Self::None),
            other => Err(ConfigError::Invalid {
                key: "SMTP_ENCRYPTION",
                reason: format!("{}. Use 'tls', 'starttls', or 'none'", other),
            }),
        }
    }
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub encryption: SmtpEncryption,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("encryption", &self.encryption)
            .field("username", &self.username)
            .field("from_email", &self.from_email)
            .field("from_name", &self.from_name)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Process configuration. Built once at startup and handed to the services
/// that need it.
#[derive(Clone)]
pub struct AppConfig {
    pub environment: String,
    pub database_url: String,
    pub base_url: String,
    pub host: String,
    pub port: u16,
    pub force_https: bool,
    /// Signing key for email confirmation tokens.
    pub secret_key: Vec<u8>,
    /// Raw `SESSION_SECRET`, if one was provided.
    pub session_secret: Option<Vec<u8>>,
    pub smtp: Option<SmtpConfig>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("environment", &self.environment)
            .field("database_url", &self.database_url)
            .field("base_url", &self.base_url)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("force_https", &self.force_https)
            .field("smtp", &self.smtp)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let environment = get("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let is_production = environment == "production";

        let secret_key = match get("SECRET_KEY") {
            Some(secret) => decode_secret_bytes("SECRET_KEY", &secret)?,
            None if is_production => return Err(ConfigError::Missing("SECRET_KEY")),
            None => {
                warn!("SECRET_KEY not set; generating ephemeral key (development only)");
                let mut key = vec![0u8; 64];
                rand::thread_rng().fill_bytes(&mut key);
                key
            }
        };

        let port = parse_or(get("PORT"), "PORT", 8080u16)?;

        let smtp = match get("SMTP_HOST") {
            Some(host) => Some(SmtpConfig::from_lookup(host, &get)?),
            None => None,
        };

        let config = AppConfig {
            environment,
            database_url: get("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://data/accountgate.db".to_string()),
            base_url: get("BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{}", port))
                .trim_end_matches('/')
                .to_string(),
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            force_https: get("FORCE_HTTPS").is_some_and(|value| flag_enabled(&value)),
            secret_key,
            session_secret: get("SESSION_SECRET")
                .map(|secret| decode_secret_bytes("SESSION_SECRET", &secret))
                .transpose()?,
            smtp,
        };

        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Rejects production deployments with plain HTTP, guessable secrets or
    /// no way to deliver verification mail.
    pub fn validate_production(&self) -> Result<(), ConfigError> {
        if !self.is_production() {
            return Ok(());
        }

        if !self.force_https {
            return Err(ConfigError::Insecure(
                "production requires HTTPS. Set FORCE_HTTPS=true".to_string(),
            ));
        }

        if self.secret_key.len() < MIN_SECRET_KEY_BYTES {
            return Err(ConfigError::Insecure(format!(
                "SECRET_KEY must be at least {} bytes",
                MIN_SECRET_KEY_BYTES
            )));
        }

        if looks_like_placeholder(&self.secret_key) {
            return Err(ConfigError::Insecure(
                "SECRET_KEY appears to be a default value".to_string(),
            ));
        }

        // The mock mailer would report success without delivering anything
        if self.smtp.is_none() {
            return Err(ConfigError::Missing("SMTP_HOST"));
        }

        Ok(())
    }
}

pub fn verification_url(base_url: &str, token: &str) -> String {
    format!("{}/verify_email/{}", base_url.trim_end_matches('/'), token)
}

impl SmtpConfig {
    fn from_lookup<G>(host: String, get: &G) -> Result<Self, ConfigError>
    where
        G: Fn(&str) -> Option<String>,
    {
        let username = get("SMTP_USERNAME").ok_or(ConfigError::Missing("SMTP_USERNAME"))?;
        let password = get("SMTP_PASSWORD").ok_or(ConfigError::Missing("SMTP_PASSWORD"))?;
        let encryption = match get("SMTP_ENCRYPTION") {
            Some(value) => SmtpEncryption::parse(&value)?,
            None => SmtpEncryption::StartTls,
        };
        let timeout_secs = parse_or(get("SMTP_TIMEOUT_SECS"), "SMTP_TIMEOUT_SECS", 10u64)?;

        Ok(SmtpConfig {
            host,
            port: parse_or(get("SMTP_PORT"), "SMTP_PORT", 587u16)?,
            encryption,
            from_email: get("SMTP_FROM_EMAIL").unwrap_or_else(|| username.clone()),
            from_name: get("SMTP_FROM_NAME").unwrap_or_else(|| "Accountgate".to_string()),
            username,
            password,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn flag_enabled(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "True")
}

fn looks_like_placeholder(secret: &[u8]) -> bool {
    let lowered = String::from_utf8_lossy(secret).to_ascii_lowercase();
    ["example", "changeme", "default", "your_secret_key"]
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Prefix marking a secret as standard base64. Anything else is used as raw
/// bytes.
pub const BASE64_SECRET_PREFIX: &str = "base64:";

pub fn decode_secret_bytes(key: &'static str, secret: &str) -> Result<Vec<u8>, ConfigError> {
    match secret.strip_prefix(BASE64_SECRET_PREFIX) {
        Some(encoded) => STANDARD
            .decode(encoded.trim())
            .map_err(|e| ConfigError::Invalid {
                key,
                reason: format!("bad base64 after '{}': {}", BASE64_SECRET_PREFIX, e),
            }),
        None => Ok(secret.as_bytes().to_vec()),
    }
}
