use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use std::sync::{Arc, Mutex};

use crate::config::{SmtpConfig, SmtpEncryption};

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Failed to build email message: {0}")]
    MessageBuild(String),
    #[error("Failed to send email: {0}")]
    SendFailed(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[async_trait]
pub trait EmailService: Send + Sync {
    /// Delivers a plain-text message. Transport failures, including timeouts,
    /// are returned to the caller.
    async fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<(), EmailError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Logs messages instead of sending them and keeps them in an outbox.
#[derive(Default)]
pub struct MockEmailService {
    outbox: Mutex<Vec<SentEmail>>,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }

    pub fn last_sent_to(&self, to_email: &str) -> Option<SentEmail> {
        self.sent()
            .into_iter()
            .rev()
            .find(|email| email.to == to_email)
    }
}

#[async_trait]
impl EmailService for MockEmailService {
    async fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        tracing::info!("📧 [MOCK EMAIL] To: {}", to_email);
        tracing::info!("   Subject: {}", subject);
        tracing::info!("   {}", body);
        tracing::info!("   ---");

        self.outbox
            .lock()
            .map_err(|_| EmailError::SendFailed("mock outbox poisoned".to_string()))?
            .push(SentEmail {
                to: to_email.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });

        Ok(())
    }
}

pub struct SmtpEmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
    from_name: String,
}

impl SmtpEmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self, EmailError> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());

        let builder = match config.encryption {
            SmtpEncryption::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| EmailError::ConfigError(format!("SMTP relay error: {}", e)))?,
            SmtpEncryption::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                    .map_err(|e| EmailError::ConfigError(format!("SMTP starttls error: {}", e)))?
            }
            SmtpEncryption::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            }
        };

        let mailer = builder
            .port(config.port)
            .credentials(credentials)
            .timeout(Some(config.timeout))
            .build();

        Ok(Self {
            mailer,
            from_email: config.from_email.clone(),
            from_name: config.from_name.clone(),
        })
    }
}

#[async_trait]
impl EmailService for SmtpEmailService {
    async fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                format!("{} <{}>", self.from_name, self.from_email)
                    .parse()
                    .map_err(|e| {
                        EmailError::MessageBuild(format!("Invalid from address: {}", e))
                    })?,
            )
            .to(to_email
                .parse()
                .map_err(|e| EmailError::MessageBuild(format!("Invalid to address: {}", e)))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| EmailError::MessageBuild(e.to_string()))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        Ok(())
    }
}

pub fn create_email_service(smtp: Option<&SmtpConfig>) -> Result<Arc<dyn EmailService>, EmailError> {
    match smtp {
        Some(config) => {
            let service = SmtpEmailService::new(config)?;
            tracing::info!("Using SMTP email service via {}:{}", config.host, config.port);
            Ok(Arc::new(service))
        }
        None => {
            tracing::info!(
                "SMTP not configured. Using mock email service (emails will be logged to console)"
            );
            Ok(Arc::new(MockEmailService::new()))
        }
    }
}
