pub mod app;
pub mod session;

pub use app::{AppConfig, ConfigError, SmtpConfig, SmtpEncryption};
pub use session::{SessionConfig, SessionLayer};
