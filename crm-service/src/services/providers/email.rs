use super::{MailMessage, MailSender, ProviderError, ProviderResponse};
use crate::config::SmtpConfig;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Mutex;

/// Sends reminder mail through a STARTTLS relay. Only built when SMTP is
/// enabled; the sender mailbox is checked up front.
pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, ProviderError> {
        if !config.enabled {
            return Err(ProviderError::NotEnabled(
                "SMTP mailer is not enabled".to_string(),
            ));
        }

        let address: Address = config.from_email.parse().map_err(|e| {
            ProviderError::Configuration(format!(
                "Invalid from address '{}': {}",
                config.from_email, e
            ))
        })?;
        let name = Some(config.from_name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        Ok(Self {
            from: Mailbox::new(name, address),
            transport: relay(config)?,
        })
    }

    fn compose(&self, mail: &MailMessage) -> Result<Message, ProviderError> {
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|e| ProviderError::InvalidRecipient(format!("{}: {}", mail.to, e)))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| ProviderError::SendFailed(format!("Failed to build message: {}", e)))
    }
}

/// Relays without a user are used unauthenticated.
fn relay(config: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, ProviderError> {
    let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        .map_err(|e| ProviderError::Configuration(format!("SMTP relay {}: {}", config.host, e)))?
        .port(config.port);

    let builder = if config.user.is_empty() {
        builder
    } else {
        builder.credentials(Credentials::new(
            config.user.clone(),
            config.password.clone(),
        ))
    };

    Ok(builder.build())
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send(&self, mail: &MailMessage) -> Result<ProviderResponse, ProviderError> {
        let message = self.compose(mail)?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| ProviderError::Connection(format!("SMTP delivery failed: {}", e)))?;

        let provider_id = response.message().next().map(str::to_string);
        tracing::info!(to = %mail.to, subject = %mail.subject, "Reminder email sent");

        Ok(ProviderResponse::success(provider_id))
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Mock mailer for local runs and tests. Keeps every message it accepts.
pub struct MockMailer {
    enabled: bool,
    sent: Mutex<Vec<MailMessage>>,
}

impl MockMailer {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MailSender for MockMailer {
    async fn send(&self, mail: &MailMessage) -> Result<ProviderResponse, ProviderError> {
        if !self.enabled {
            return Err(ProviderError::NotEnabled(
                "Mock mailer is not enabled".to_string(),
            ));
        }

        let count = match self.sent.lock() {
            Ok(mut sent) => {
                sent.push(mail.clone());
                sent.len()
            }
            Err(_) => {
                return Err(ProviderError::SendFailed(
                    "Mock mailer state poisoned".to_string(),
                ))
            }
        };

        tracing::info!(to = %mail.to, subject = %mail.subject, "[MOCK] Email would be sent");

        Ok(ProviderResponse::success(Some(format!("mock-email-{}", count))))
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
