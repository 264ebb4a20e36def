//! Outbound mail
//!
//! The forgot-password flow only needs `send_mail`; delivery failures are
//! reported as `false` and never surface to the caller of that flow.

use async_trait::async_trait;
use shoparena_core::config::{MailConfig, MailProvider};
use shoparena_core::ConfigError;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Mail provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Returns `true` when the provider accepted the message
    async fn send_mail(&self, subject: &str, body: &str, recipient: &str) -> bool;
}

/// Build the mailer selected by configuration
pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, ConfigError> {
    match config.provider {
        MailProvider::Log => Ok(Arc::new(LogMailer)),
        MailProvider::Mailgun => {
            let domain = config
                .mailgun_domain
                .clone()
                .ok_or_else(|| ConfigError::MissingRequired("MAILGUN_DOMAIN".to_string()))?;
            let api_key = config
                .mailgun_api_key
                .clone()
                .ok_or_else(|| ConfigError::MissingRequired("MAILGUN_API_KEY".to_string()))?;
            Ok(Arc::new(MailgunMailer::new(domain, api_key, config.sender.clone())))
        }
    }
}

/// Writes messages to the log instead of sending them
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_mail(&self, subject: &str, body: &str, recipient: &str) -> bool {
        info!(recipient = %recipient, subject = %subject, body = %body, "Mail (log provider)");
        true
    }
}

/// Sends through the Mailgun messages API
pub struct MailgunMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    sender: String,
}

impl MailgunMailer {
    pub fn new(domain: String, api_key: String, sender: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("https://api.mailgun.net/v3/{domain}/messages"),
            api_key,
            sender,
        }
    }

    async fn deliver(&self, subject: &str, body: &str, recipient: &str) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth("api", Some(&self.api_key))
            .form(&[
                ("from", self.sender.as_str()),
                ("to", recipient),
                ("subject", subject),
                ("html", body),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Mailer for MailgunMailer {
    async fn send_mail(&self, subject: &str, body: &str, recipient: &str) -> bool {
        match self.deliver(subject, body, recipient).await {
            Ok(()) => true,
            Err(e) => {
                warn!(recipient = %recipient, error = %e, "Mail delivery failed");
                false
            }
        }
    }
}

/// Message captured by [`RecordingMailer`]
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone)]
pub struct SentMail {
    pub subject: String,
    pub body: String,
    pub recipient: String,
}

/// Keeps every message in memory
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct RecordingMailer {
    sent: tokio::sync::Mutex<Vec<SentMail>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingMailer {
    pub async fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().await.clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_mail(&self, subject: &str, body: &str, recipient: &str) -> bool {
        self.sent.lock().await.push(SentMail {
            subject: subject.to_string(),
            body: body.to_string(),
            recipient: recipient.to_string(),
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailgun_requires_credentials() {
        let config = MailConfig {
            provider: MailProvider::Mailgun,
            mailgun_domain: Some("mg.example.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            from_config(&config),
            Err(ConfigError::MissingRequired(key)) if key == "MAILGUN_API_KEY"
        ));
    }

    #[tokio::test]
    async fn test_log_mailer_accepts() {
        let mailer = from_config(&MailConfig::default()).unwrap();
        assert!(mailer.send_mail("Hi", "<p>Hello</p>", "ada@example.com").await);
    }
}
